//! Error taxonomy for the routing core.
//!
//! Every failure the router can hit is returned to the caller as an [`Error`];
//! nothing is swallowed or retried internally.

use std::path::PathBuf;

/// Errors produced by the topic store, the note writers, and the router.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The embedding provider was unreachable or returned an unusable response.
    #[error("embedding failed: {0}")]
    Embedding(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An update or lookup referenced a topic id that is not in the store.
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    /// An append targeted a topic document that does not exist on disk.
    #[error("topic document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    /// A vector's length does not match the stored centroid.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The durable index rejected a read or write.
    #[error("topic index error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A note file could not be created, written, or synced.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid thresholds, sizes, or unusable directories.
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    /// The blocking task running the commit phase panicked or was cancelled.
    #[error("routing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Wrap a provider error without interpreting it.
    pub fn embedding(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Embedding(err.into())
    }

    /// `true` for storage-level failures (index or filesystem).
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }

    /// `true` when the failure concerns a single document and a batch caller
    /// can record it and move on to the next one.
    pub fn is_document_level(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_)
                | Self::TopicNotFound(_)
                | Self::DocumentNotFound(_)
                | Self::DimensionMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
