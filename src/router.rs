//! Topic router — files each classified document into a topic.
//!
//! [`TopicRouter::route`] embeds the document, scores every stored topic by
//! cosine similarity to its centroid (plus a bounded bonus for topic hints
//! found in the topic's title or file stem), and either appends to the best
//! topic when its score reaches the threshold or seeds a new topic.
//!
//! The embedding call runs concurrently across callers. Everything after it
//! (read candidates, decide, write files, commit) runs on the blocking pool
//! under one lock on the index connection, so two routes can never both
//! create the same cluster or lose a centroid update. A failed route rolls
//! back the index transaction and undoes its file writes.

use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{LinkmemConfig, RoutingConfig};
use crate::db;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::notes::entry_writer::{EntryLocation, EntryWriter};
use crate::notes::topic_writer::TopicWriter;
use crate::topics::similarity::{cosine_similarity, normalize_hints, HintBonus};
use crate::topics::store::{self, RoutingLogEntry};
use crate::topics::types::{truncate_chars, RouteAction, RoutedDocument, Topic};

/// A document to route, with the classifier's hints.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub document: RoutedDocument,
    /// Free-text category/tag signals. Added to the embedding input and used
    /// for the lexical bonus.
    pub topic_hints: Vec<String>,
    /// Title for the topic if this document seeds one.
    pub title_for_new_topic: Option<String>,
    /// Whether to add the document's block to the topic document.
    pub append: bool,
}

impl RouteRequest {
    pub fn new(document: RoutedDocument) -> Self {
        Self {
            document,
            topic_hints: Vec::new(),
            title_for_new_topic: None,
            append: true,
        }
    }

    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topic_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_new_topic_title(mut self, title: impl Into<String>) -> Self {
        self.title_for_new_topic = Some(title.into());
        self
    }

    pub fn without_append(mut self) -> Self {
        self.append = false;
        self
    }
}

/// Result of a successful route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    pub topic_id: String,
    pub storage_location: String,
    pub action: RouteAction,
    /// Combined score of the best existing topic, if any topic existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Canonical entry path relative to the links directory.
    pub entry_location: String,
    /// Topic document count after this route.
    pub document_count: u64,
}

/// Decision knobs, taken from `[routing]`.
#[derive(Debug, Clone, Copy)]
pub struct RouterSettings {
    pub similarity_threshold: f64,
    pub embed_content_chars: usize,
    pub hint_bonus: HintBonus,
}

impl From<&RoutingConfig> for RouterSettings {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            embed_content_chars: config.embed_content_chars,
            hint_bonus: HintBonus {
                per_match: config.hint_bonus_per_match,
                cap: config.hint_bonus_cap,
            },
        }
    }
}

/// The routing engine. Cheap to clone; clones share the index and the lock.
#[derive(Clone)]
pub struct TopicRouter {
    inner: Arc<RouterInner>,
    embedding: Arc<dyn EmbeddingProvider>,
}

struct RouterInner {
    db: Mutex<Connection>,
    topics: TopicWriter,
    entries: EntryWriter,
    settings: RouterSettings,
    /// Prefix that turns an entry's links-relative path into a link from a
    /// topic document.
    entry_link_prefix: String,
}

impl TopicRouter {
    /// Validate `config`, create the output layout, open the topic index, and
    /// check that stored centroids came from the configured model.
    pub fn open(config: &LinkmemConfig, embedding: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;

        let topics = TopicWriter::new(config.topics_dir(), &config.notes)?;
        let entries = EntryWriter::new(config.links_dir(), &config.notes)?;
        let index_path = config.index_path();
        let conn = db::open_database(&index_path)?;

        match db::migrations::get_embedding_model(&conn)? {
            None => db::migrations::set_embedding_model(&conn, embedding.model_id())?,
            Some(stored) if stored != embedding.model_id() => {
                tracing::warn!(
                    stored = %stored,
                    configured = %embedding.model_id(),
                    "embedding model changed; stored centroids are not comparable with new embeddings"
                );
            }
            Some(_) => {}
        }

        let entry_link_prefix = link_prefix(topics.topics_dir(), entries.links_dir());
        tracing::info!(
            index = %index_path.display(),
            topics = %topics.topics_dir().display(),
            threshold = config.routing.similarity_threshold,
            "topic router ready"
        );

        Ok(Self {
            inner: Arc::new(RouterInner {
                db: Mutex::new(conn),
                topics,
                entries,
                settings: RouterSettings::from(&config.routing),
                entry_link_prefix,
            }),
            embedding,
        })
    }

    pub fn settings(&self) -> RouterSettings {
        self.inner.settings
    }

    pub fn topics_dir(&self) -> &Path {
        self.inner.topics.topics_dir()
    }

    pub fn links_dir(&self) -> &Path {
        self.inner.entries.links_dir()
    }

    /// Absolute path of a topic document.
    pub fn topic_document_path(&self, storage_location: &str) -> PathBuf {
        self.inner.topics.path_of(storage_location)
    }

    /// Route one document. Returns the topic it was filed under.
    ///
    /// Embedding failures and storage failures are returned unchanged; on any
    /// error the index and every previously written topic document are left
    /// as they were.
    pub async fn route(&self, request: RouteRequest) -> Result<RouteOutcome> {
        let input = build_embedding_input(
            &request.document,
            &request.topic_hints,
            self.inner.settings.embed_content_chars,
        );
        let embedding = self
            .embedding
            .embed(&input)
            .await
            .map_err(Error::embedding)?;
        if embedding.is_empty() {
            return Err(Error::embedding(anyhow::anyhow!(
                "provider returned an empty vector"
            )));
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::embedding(anyhow::anyhow!(
                "provider returned a vector with non-finite components"
            )));
        }

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.decide_and_commit(&request, &embedding)).await?
    }

    /// All topics in insertion order.
    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        self.with_conn(|conn| store::list_topics(conn)).await
    }

    pub async fn get_topic(&self, topic_id: &str) -> Result<Topic> {
        let topic_id = topic_id.to_string();
        self.with_conn(move |conn| store::get_topic(conn, &topic_id)).await
    }

    pub async fn topic_count(&self) -> Result<u64> {
        self.with_conn(|conn| store::topic_count(conn)).await
    }

    pub async fn routing_history(&self, topic_id: &str) -> Result<Vec<RoutingLogEntry>> {
        let topic_id = topic_id.to_string();
        self.with_conn(move |conn| store::routing_history(conn, &topic_id)).await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&*inner.lock())).await?
    }
}

impl RouterInner {
    /// A panic inside the critical section drops the open transaction and
    /// runs the rollback guard, so a poisoned lock still guards a consistent
    /// index.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decide_and_commit(&self, request: &RouteRequest, embedding: &[f32]) -> Result<RouteOutcome> {
        let mut conn = self.lock();

        let candidates = store::list_topics(&conn)?;
        let hints = normalize_hints(&request.topic_hints);
        let best = self.best_candidate(&candidates, embedding, &hints);
        let best_score = best.map(|(_, score)| score);

        let mut undo = Rollback::default();
        let tx = conn.transaction()?;

        let outcome = match best {
            Some((topic, score)) if score >= self.settings.similarity_threshold => {
                self.append_to_topic(&tx, &mut undo, topic, score, request, embedding)?
            }
            _ => self.create_topic(&tx, &mut undo, best_score, request, embedding)?,
        };

        tx.commit()?;
        undo.disarm();

        tracing::info!(
            topic_id = %outcome.topic_id,
            action = %outcome.action,
            score = ?outcome.score,
            document_count = outcome.document_count,
            source_id = %request.document.source_id,
            "document routed"
        );
        Ok(outcome)
    }

    /// Highest combined score; the earliest topic wins ties.
    fn best_candidate<'t>(
        &self,
        candidates: &'t [Topic],
        embedding: &[f32],
        hints: &[String],
    ) -> Option<(&'t Topic, f64)> {
        let mut best: Option<(&Topic, f64)> = None;
        for topic in candidates {
            if topic.centroid.len() != embedding.len() {
                tracing::warn!(
                    topic_id = %topic.topic_id,
                    expected = topic.centroid.len(),
                    actual = embedding.len(),
                    "skipping topic with different embedding dimension"
                );
                continue;
            }
            let similarity = cosine_similarity(embedding, &topic.centroid);
            let bonus = self
                .settings
                .hint_bonus
                .score(hints, &topic.title, topic.location_stem());
            let score = similarity + bonus;
            if !score.is_finite() {
                tracing::warn!(topic_id = %topic.topic_id, "skipping topic with non-finite centroid");
                continue;
            }
            tracing::debug!(topic_id = %topic.topic_id, similarity, bonus, "candidate scored");

            if best.map_or(true, |(_, s)| score > s) {
                best = Some((topic, score));
            }
        }
        best
    }

    fn append_to_topic<'a>(
        &'a self,
        tx: &Connection,
        undo: &mut Rollback<'a>,
        topic: &Topic,
        score: f64,
        request: &RouteRequest,
        embedding: &[f32],
    ) -> Result<RouteOutcome> {
        let location = topic.storage_location.clone();
        let snapshot = if request.append {
            Some(self.topics.read(&location)?)
        } else {
            None
        };

        let updated = store::update_centroid(tx, &topic.topic_id, embedding)?;
        let entry = self.write_entry(undo, request, &topic.topic_id, &location)?;

        if let Some(snapshot) = snapshot {
            let restore_location = location.clone();
            undo.push(move || self.topics.restore(&restore_location, &snapshot));
            self.topics
                .append(&location, &request.document, Some(&self.entry_link(&entry)))?;
        }

        store::write_routing_log(
            tx,
            &topic.topic_id,
            &request.document.source_id,
            RouteAction::Appended,
            Some(score),
            Some(&entry.relative),
        )?;

        Ok(RouteOutcome {
            topic_id: updated.topic_id,
            storage_location: location,
            action: RouteAction::Appended,
            score: Some(score),
            entry_location: entry.relative,
            document_count: updated.document_count,
        })
    }

    fn create_topic<'a>(
        &'a self,
        tx: &Connection,
        undo: &mut Rollback<'a>,
        best_score: Option<f64>,
        request: &RouteRequest,
        embedding: &[f32],
    ) -> Result<RouteOutcome> {
        let document = &request.document;
        let title = new_topic_title(request);

        // The id exists before anything that mentions it is written.
        let topic_id = store::new_topic_id();
        let location = self.topics.create(&topic_id, &title, &document.tags)?;
        let created_location = location.clone();
        undo.push(move || self.topics.remove(&created_location));

        let topic = store::insert_topic(tx, &topic_id, &location, embedding, &title)?;
        let entry = self.write_entry(undo, request, &topic_id, &location)?;

        if request.append {
            self.topics
                .append(&location, document, Some(&self.entry_link(&entry)))?;
        }

        store::write_routing_log(
            tx,
            &topic_id,
            &document.source_id,
            RouteAction::Created,
            best_score,
            Some(&entry.relative),
        )?;

        Ok(RouteOutcome {
            topic_id: topic.topic_id,
            storage_location: location,
            action: RouteAction::Created,
            score: best_score,
            entry_location: entry.relative,
            document_count: topic.document_count,
        })
    }

    fn write_entry<'a>(
        &'a self,
        undo: &mut Rollback<'a>,
        request: &RouteRequest,
        topic_id: &str,
        location: &str,
    ) -> Result<EntryLocation> {
        let entry = self.entries.write(&request.document, topic_id, location)?;
        let written = entry.clone();
        undo.push(move || self.entries.discard(&written));
        Ok(entry)
    }

    fn entry_link(&self, entry: &EntryLocation) -> String {
        format!("{}/{}", self.entry_link_prefix, entry.relative)
    }
}

/// Text handed to the embedding provider: the source id, a bounded prefix of
/// the body, and the hints.
pub fn build_embedding_input(
    document: &RoutedDocument,
    topic_hints: &[String],
    max_content_chars: usize,
) -> String {
    let content = truncate_chars(document.body.trim(), max_content_chars);
    let mut text = if content.is_empty() {
        document.source_id.clone()
    } else {
        format!("{}\n\n{}", document.source_id, content)
    };

    let hints: Vec<&str> = topic_hints
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .collect();
    if !hints.is_empty() {
        text.push_str("\n\nHints: ");
        text.push_str(&hints.join(" | "));
    }
    text
}

/// `title_for_new_topic`, else the document title, else its source id.
fn new_topic_title(request: &RouteRequest) -> String {
    request
        .title_for_new_topic
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| request.document.display_title())
        .to_string()
}

fn link_prefix(topics_dir: &Path, links_dir: &Path) -> String {
    match (topics_dir.parent(), links_dir.parent(), links_dir.file_name()) {
        (Some(a), Some(b), Some(name)) if a == b => format!("../{}", name.to_string_lossy()),
        _ => links_dir.to_string_lossy().trim_end_matches('/').to_string(),
    }
}

/// File effects to undo if the route does not commit. Runs in reverse order
/// on drop unless disarmed.
#[derive(Default)]
struct Rollback<'a> {
    actions: Vec<Box<dyn FnOnce() -> Result<()> + 'a>>,
}

impl<'a> Rollback<'a> {
    fn push(&mut self, action: impl FnOnce() -> Result<()> + 'a) {
        self.actions.push(Box::new(action));
    }

    fn disarm(mut self) {
        self.actions.clear();
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        while let Some(action) = self.actions.pop() {
            if let Err(e) = action() {
                tracing::error!(error = %e, "failed to undo file write after aborted route");
            }
        }
    }
}
