//! Error types for the memory retrieval layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Caller violated a precondition. Surfaced immediately, never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Embedding or upsert failure during a store operation. No partial
    /// write is observable when this is returned.
    #[error("Store error: {0}")]
    Store(String),

    /// Transport or structural failure of the reranking service.
    #[error("Rerank error: {0}")]
    Rerank(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
