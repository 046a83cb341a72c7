//! Text-to-vector embedding seam.
//!
//! The router only sees the [`EmbeddingProvider`] trait. [`http`] implements
//! it against OpenAI-compatible `/embeddings` endpoints; tests plug in their
//! own deterministic providers. Create the configured provider with
//! [`create_provider`].

pub mod http;

use anyhow::Result;
use std::sync::Arc;

/// Trait for embedding text into vectors.
///
/// Errors are opaque to the caller: the router wraps them unchanged and never
/// retries.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier of the model producing the vectors, recorded alongside the
    /// stored centroids.
    fn model_id(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// Currently only `"http"` is supported (OpenAI-compatible endpoint).
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "http" => {
            let provider = http::HttpEmbeddingProvider::new(config)?;
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: http"),
    }
}
