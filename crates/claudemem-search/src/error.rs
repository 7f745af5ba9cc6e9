//! Error types for claudemem-search.

use thiserror::Error;

/// Errors produced by the embedder, index store, and retriever.
///
/// The variants map onto the error-kind taxonomy of spec.md §7: a
/// [`SearchError::Configuration`] is fatal and surfaced with remediation, a
/// [`SearchError::Authentication`] never retries, and a
/// [`SearchError::Transient`] is what remains once the provider's own
/// retry/backoff loop has been exhausted for a batch.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Missing credentials, incompatible embedding dimension, schema mismatch.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 401/403 from a remote provider. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A remote call was retried to exhaustion (timeouts, 5xx, rate limits).
    #[error("provider request failed after retries: {0}")]
    Transient(String),

    /// Stored embedding dimension does not match the configured model's.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding provider is unavailable (model not loaded, endpoint down).
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The operation was cancelled before completion (spec.md §7, not an error).
    #[error("operation cancelled")]
    Cancelled,

    /// Underlying sqlite storage error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// HTTP transport error talking to a remote provider.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// IO error (model download, file read).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Local model inference error.
    #[error("model inference error: {0}")]
    Inference(String),
}

impl From<candle_core::Error> for SearchError {
    fn from(err: candle_core::Error) -> Self {
        SearchError::Inference(err.to_string())
    }
}

/// Result type for claudemem-search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
