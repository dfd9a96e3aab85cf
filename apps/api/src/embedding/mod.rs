//! Sentence embedding backends and the `.npy` matrices they produce.
//!
//! Implementations:
//! - `HashEmbedder`: feature hashing, deterministic, no model files
//! - `HttpEmbedder`: OpenAI-compatible `/embeddings` endpoint
//!
//! The pipeline only depends on the `Embedder` trait, chosen at startup via `EMBEDDER`.

pub mod generator;
pub mod hash;
pub mod http;
pub mod matrix;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;
pub use matrix::EmbeddingMatrix;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("embedding has dimension {actual}, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding response is missing input #{0}")]
    MissingResult(usize),

    #[error("embedder misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Backend name ("hash", "http"), recorded in logs and run metadata.
    fn name(&self) -> &'static str;

    fn dimension(&self) -> usize;

    /// Embeds `texts` in order; the result has exactly one vector per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Builds the embedder named by `config.embedder`.
pub fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.embedder.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.embedding_dim))),
        "http" => Ok(Arc::new(HttpEmbedder::new(
            config.embedding_api_url.clone(),
            config.embedding_api_key.clone(),
            config.embedding_model.clone(),
            config.embedding_dim,
            config.embedding_batch_size,
        )?)),
        other => Err(EmbeddingError::Config(format!(
            "unknown EMBEDDER '{other}' (expected 'hash' or 'http')"
        ))),
    }
}
