mod helpers;

use std::sync::Arc;

use helpers::*;
use linkmem::topics::types::RouteAction;
use linkmem::TopicRouter;
use tempfile::TempDir;

const DIMS: usize = 8;

#[tokio::test]
async fn first_document_always_creates_a_topic() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, DIMS));
    let router = open_router(&tmp, embedder.clone());

    let outcome = router
        .route(request("https://a.dev/1", "Tokio Internals").with_new_topic_title("Async Rust"))
        .await
        .unwrap();

    assert_eq!(outcome.action, RouteAction::Created);
    assert_eq!(outcome.score, None);
    assert_eq!(outcome.document_count, 1);
    assert_eq!(outcome.storage_location, "async_rust.md");

    let text = std::fs::read_to_string(router.topic_document_path(&outcome.storage_location)).unwrap();
    assert!(text.starts_with("---\n"));
    assert!(text.contains(&format!("topic_id: {}\n", outcome.topic_id)));
    assert!(text.contains("# Topic: Async Rust\n"));
    assert!(text.contains("## [["));
    assert!(text.contains("] Tokio Internals\n"));
    assert!(text.contains(&format!("(../links/{})", outcome.entry_location)));
    assert_eq!(block_count(&text), 1);

    assert!(router.links_dir().join(&outcome.entry_location).exists());
    assert_eq!(router.topic_count().await.unwrap(), 1);
}

#[tokio::test]
async fn similar_document_appends_and_updates_centroid() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", vec![1.0, 0.0, 0.0]);
    embedder.set("https://a.dev/2", vec![0.8, 0.2, 0.0]);
    let router = open_router(&tmp, embedder.clone());

    let first = router.route(request("https://a.dev/1", "One")).await.unwrap();
    let second = router.route(request("https://a.dev/2", "Two")).await.unwrap();

    assert_eq!(second.action, RouteAction::Appended);
    assert_eq!(second.topic_id, first.topic_id);
    assert_eq!(second.storage_location, first.storage_location);
    assert_eq!(second.document_count, 2);
    assert!(second.score.unwrap() >= 0.75);

    let topic = router.get_topic(&first.topic_id).await.unwrap();
    assert_eq!(topic.document_count, 2);
    assert!((topic.centroid[0] - 0.9).abs() < 1e-6);
    assert!((topic.centroid[1] - 0.1).abs() < 1e-6);
    assert_eq!(topic.centroid[2], 0.0);

    let text = std::fs::read_to_string(router.topic_document_path(&first.storage_location)).unwrap();
    assert_eq!(block_count(&text), 2);
    let one = text.find("] One\n").unwrap();
    let two = text.find("] Two\n").unwrap();
    assert!(one < two, "blocks must stay in routing order");
}

#[tokio::test]
async fn dissimilar_document_seeds_a_new_topic() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, DIMS));
    embedder.set("https://b.dev/1", spike(1, DIMS));
    let router = open_router(&tmp, embedder.clone());

    let first = router.route(request("https://a.dev/1", "Rust")).await.unwrap();
    let second = router.route(request("https://b.dev/1", "Gardening")).await.unwrap();

    assert_eq!(second.action, RouteAction::Created);
    assert_ne!(second.topic_id, first.topic_id);
    assert_eq!(second.score, Some(0.0));

    let topics = router.list_topics().await.unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0].topic_id, first.topic_id);
    assert_eq!(topics[1].topic_id, second.topic_id);
}

#[tokio::test]
async fn routing_never_touches_other_topics() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    for i in 0..5 {
        embedder.set(&format!("https://a.dev/{i}"), near_spike(0, 2 + i, 0.1, DIMS));
        embedder.set(&format!("https://b.dev/{i}"), near_spike(1, 2 + i, 0.1, DIMS));
    }
    embedder.set("https://a.dev/new", near_spike(0, 7, 0.2, DIMS));
    let router = open_router(&tmp, embedder.clone());

    for i in 0..5 {
        router
            .route(request(&format!("https://a.dev/{i}"), &format!("Rust {i}")).with_new_topic_title("Rust"))
            .await
            .unwrap();
        router
            .route(request(&format!("https://b.dev/{i}"), &format!("Garden {i}")).with_new_topic_title("Garden"))
            .await
            .unwrap();
    }

    let topics = router.list_topics().await.unwrap();
    assert_eq!(topics.len(), 2);
    let (a, b) = (&topics[0], &topics[1]);
    assert_eq!(a.document_count, 5);
    assert_eq!(b.document_count, 5);

    let b_path = router.topic_document_path(&b.storage_location);
    let b_bytes = std::fs::read(&b_path).unwrap();

    let outcome = router
        .route(request("https://a.dev/new", "Rust 11"))
        .await
        .unwrap();
    assert_eq!(outcome.topic_id, a.topic_id);
    assert_eq!(outcome.document_count, 6);

    assert_eq!(std::fs::read(&b_path).unwrap(), b_bytes);
    let b_after = router.get_topic(&b.topic_id).await.unwrap();
    assert_eq!(&b_after, b);
}

#[tokio::test]
async fn score_equal_to_threshold_appends() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.routing.similarity_threshold = 0.6;
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", vec![1.0, 0.0, 0.0]);
    // cos = 3 / (1 * 5), exactly 0.6 in f64
    embedder.set("https://a.dev/2", vec![3.0, 4.0, 0.0]);
    let router = TopicRouter::open(&config, embedder.clone()).unwrap();

    let first = router.route(request("https://a.dev/1", "One")).await.unwrap();
    let second = router.route(request("https://a.dev/2", "Two")).await.unwrap();

    assert_eq!(second.action, RouteAction::Appended);
    assert_eq!(second.topic_id, first.topic_id);
    assert_eq!(second.score, Some(0.6));
    assert_eq!(router.topic_count().await.unwrap(), 1);
}

#[tokio::test]
async fn ties_go_to_the_earliest_topic() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", vec![1.0, 0.0, 1.0]);
    embedder.set("https://b.dev/1", vec![0.0, 1.0, 1.0]);
    // Same dot product and centroid norm against both topics.
    embedder.set("https://c.dev/1", vec![1.0, 1.0, 2.0]);
    let router = open_router(&tmp, embedder.clone());

    let alpha = router.route(request("https://a.dev/1", "Alpha")).await.unwrap();
    let beta = router.route(request("https://b.dev/1", "Beta")).await.unwrap();
    assert_eq!(beta.action, RouteAction::Created);

    let tied = router.route(request("https://c.dev/1", "Tied")).await.unwrap();
    assert_eq!(tied.action, RouteAction::Appended);
    assert_eq!(tied.topic_id, alpha.topic_id);
    assert!(tied.score.unwrap() >= 0.75);

    let beta_topic = router.get_topic(&beta.topic_id).await.unwrap();
    assert_eq!(beta_topic.document_count, 1);
    assert_eq!(beta_topic.centroid, vec![0.0, 1.0, 1.0]);
}

#[tokio::test]
async fn hint_bonus_can_tip_a_borderline_match() {
    // Both borderline vectors sit at cosine 0.72 to `base`, just under the
    // 0.75 threshold, and nearly orthogonal to each other.
    let base = vec![1.0, 0.0];
    let off_axis = (1.0f32 - 0.72 * 0.72).sqrt();

    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://db.dev/1", base);
    embedder.set("https://db.dev/2", vec![0.72, off_axis]);
    embedder.set("https://db.dev/3", vec![0.72, -off_axis]);
    let router = open_router(&tmp, embedder.clone());

    let seed = router
        .route(request("https://db.dev/1", "Postgres").with_new_topic_title("Databases"))
        .await
        .unwrap();

    let without_hint = router.route(request("https://db.dev/2", "Indexes")).await.unwrap();
    assert_eq!(without_hint.action, RouteAction::Created);
    assert!((without_hint.score.unwrap() - 0.72).abs() < 1e-4);

    let with_hint = router
        .route(request("https://db.dev/3", "Indexes again").with_hints(["Databases", "DATABASES"]))
        .await
        .unwrap();
    assert_eq!(with_hint.action, RouteAction::Appended);
    assert_eq!(with_hint.topic_id, seed.topic_id);
    assert!((with_hint.score.unwrap() - 0.76).abs() < 1e-4);
}

#[tokio::test]
async fn hints_are_part_of_the_embedding_input() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, DIMS));
    let router = open_router(&tmp, embedder.clone());

    router
        .route(request("https://a.dev/1", "One").with_hints(["Programming", "Rust"]))
        .await
        .unwrap();

    assert_eq!(
        embedder.inputs(),
        vec!["https://a.dev/1\n\nBody of One.\n\nHints: Programming | Rust".to_string()]
    );
}

#[tokio::test]
async fn without_append_the_topic_document_is_untouched() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, DIMS));
    embedder.set("https://a.dev/2", near_spike(0, 1, 0.1, DIMS));
    let router = open_router(&tmp, embedder.clone());

    let first = router.route(request("https://a.dev/1", "One")).await.unwrap();
    let path = router.topic_document_path(&first.storage_location);
    let before = std::fs::read(&path).unwrap();

    let second = router
        .route(request("https://a.dev/2", "Two").without_append())
        .await
        .unwrap();

    assert_eq!(second.action, RouteAction::Appended);
    assert_eq!(second.document_count, 2);
    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert!(router.links_dir().join(&second.entry_location).exists());
}

#[tokio::test]
async fn new_topic_title_falls_back_to_document_title_then_source() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, DIMS));
    embedder.set("https://b.dev/untitled", spike(1, DIMS));
    let router = open_router(&tmp, embedder.clone());

    let titled = router.route(request("https://a.dev/1", "Pin and Unpin")).await.unwrap();
    assert_eq!(titled.storage_location, "pin_and_unpin.md");
    let topic = router.get_topic(&titled.topic_id).await.unwrap();
    assert_eq!(topic.title, "Pin and Unpin");

    let untitled = router
        .route(linkmem::RouteRequest::new(
            linkmem::topics::types::RoutedDocument::new("https://b.dev/untitled"),
        ))
        .await
        .unwrap();
    assert_eq!(untitled.storage_location, "https_b_dev_untitled.md");
}

#[tokio::test]
async fn same_title_topics_get_distinct_documents() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, DIMS));
    embedder.set("https://b.dev/1", spike(1, DIMS));
    let router = open_router(&tmp, embedder.clone());

    let a = router
        .route(request("https://a.dev/1", "One").with_new_topic_title("Notes"))
        .await
        .unwrap();
    let b = router
        .route(request("https://b.dev/1", "Two").with_new_topic_title("Notes"))
        .await
        .unwrap();

    assert_eq!(a.storage_location, "notes.md");
    assert_eq!(b.storage_location, "notes_2.md");
}

#[tokio::test]
async fn topics_with_other_dimensions_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, 3));
    embedder.set("https://a.dev/2", spike(0, 4));
    let router = open_router(&tmp, embedder.clone());

    router.route(request("https://a.dev/1", "Three")).await.unwrap();
    let outcome = router.route(request("https://a.dev/2", "Four")).await.unwrap();

    assert_eq!(outcome.action, RouteAction::Created);
    assert_eq!(outcome.score, None);
    assert_eq!(router.topic_count().await.unwrap(), 2);
}

#[tokio::test]
async fn routing_history_records_each_decision() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, DIMS));
    embedder.set("https://a.dev/2", spike(0, DIMS));
    let router = open_router(&tmp, embedder.clone());

    let first = router.route(request("https://a.dev/1", "One")).await.unwrap();
    let second = router.route(request("https://a.dev/2", "Two")).await.unwrap();

    let history = router.routing_history(&first.topic_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].action, "create");
    assert_eq!(history[0].source_id, "https://a.dev/1");
    assert_eq!(history[1].action, "append");
    assert_eq!(history[1].entry_location.as_deref(), Some(second.entry_location.as_str()));
}

#[tokio::test]
async fn topics_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.set("https://a.dev/1", spike(0, DIMS));
    embedder.set("https://a.dev/2", spike(0, DIMS));

    let first = {
        let router = open_router(&tmp, embedder.clone());
        router.route(request("https://a.dev/1", "One")).await.unwrap()
    };

    let router = TopicRouter::open(&test_config(&tmp), embedder.clone()).unwrap();
    let topics = router.list_topics().await.unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].topic_id, first.topic_id);
    assert_eq!(topics[0].centroid, spike(0, DIMS));

    let second = router.route(request("https://a.dev/2", "Two")).await.unwrap();
    assert_eq!(second.action, RouteAction::Appended);
    assert_eq!(second.topic_id, first.topic_id);
}
