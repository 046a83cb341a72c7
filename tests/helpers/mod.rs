#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use linkmem::config::LinkmemConfig;
use linkmem::embedding::EmbeddingProvider;
use linkmem::topics::types::RoutedDocument;
use linkmem::{RouteRequest, TopicRouter};
use tempfile::TempDir;

/// Open a fresh in-memory index with schema and migrations applied.
pub fn test_db() -> rusqlite::Connection {
    linkmem::db::open_memory_database().unwrap()
}

/// Config rooted in `tmp`, defaults everywhere else.
pub fn test_config(tmp: &TempDir) -> LinkmemConfig {
    let mut config = LinkmemConfig::default();
    config.storage.output_dir = tmp.path().join("memory").to_string_lossy().into_owned();
    config
}

/// Open a router over `provider` with the default test config.
pub fn open_router(tmp: &TempDir, provider: Arc<dyn EmbeddingProvider>) -> TopicRouter {
    TopicRouter::open(&test_config(tmp), provider).unwrap()
}

/// Unit vector along dimension `dim`.
pub fn spike(dim: usize, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    v[dim % dims] = 1.0;
    v
}

/// `spike(dim)` nudged toward `other` by `weight`, L2-normalized.
/// Stays far above a 0.75 threshold against `spike(dim)` for small weights.
pub fn near_spike(dim: usize, other: usize, weight: f32, dims: usize) -> Vec<f32> {
    let mut v = spike(dim, dims);
    v[other % dims] += weight;
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

/// Request for `source_id` with a title and body.
pub fn request(source_id: &str, title: &str) -> RouteRequest {
    RouteRequest::new(
        RoutedDocument::new(source_id)
            .with_title(title)
            .with_summary(format!("Summary of {title}"))
            .with_body(format!("Body of {title}.")),
    )
}

/// Source id the router put at the start of an embedding input.
fn source_of(text: &str) -> &str {
    text.split("\n\n").next().unwrap_or(text)
}

/// Returns a pre-assigned vector per source id, optionally after a delay.
/// Unknown sources fail like an unreachable provider would.
#[derive(Default)]
pub struct ScriptedEmbedder {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    inputs: Mutex<Vec<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set(&self, source_id: &str, vector: Vec<f32>) {
        self.vectors
            .lock()
            .unwrap()
            .insert(source_id.to_string(), vector);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text passed to `embed`, in call order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let source = source_of(text);
        self.vectors
            .lock()
            .unwrap()
            .get(source)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no vector scripted for {source}"))
    }

    fn model_id(&self) -> &str {
        "scripted-test"
    }
}

/// Always fails.
pub struct FailingEmbedder;

#[async_trait::async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("connection refused")
    }

    fn model_id(&self) -> &str {
        "scripted-test"
    }
}

/// Number of markdown files anywhere under `dir`.
pub fn count_md_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                count_md_files(&path)
            } else if path.extension().is_some_and(|ext| ext == "md") {
                1
            } else {
                0
            }
        })
        .sum()
}

/// Number of appended blocks in a topic document.
pub fn block_count(text: &str) -> usize {
    text.matches("\n## [[").count()
}
