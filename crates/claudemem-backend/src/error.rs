//! Backend error types.
//!
//! Maps onto the error-kind taxonomy of spec.md §7: [`BackendError::Configuration`]
//! and [`BackendError::Storage`] are fatal to the current operation and surfaced
//! with remediation; [`BackendError::Transient`] is what a provider call gives up
//! with after its own retry/backoff is exhausted; [`BackendError::Authentication`]
//! never retries; [`BackendError::Cancelled`] is not an error but a distinct
//! outcome callers can match on.

use thiserror::Error;

/// Errors that can occur during backend operations (provider adapters,
/// enrichment, indexing orchestration, analysis queries).
#[derive(Error, Debug)]
pub enum BackendError {
    /// Propagated from the index store / embedder / retriever layer.
    #[error("search error: {0}")]
    Search(#[from] claudemem_search::SearchError),

    /// Propagated from discovery / extraction / graph construction.
    #[error("core error: {0}")]
    Core(String),

    /// Missing credentials, unknown model spec, invalid config.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 401/403 from a chat provider. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A chat call was retried to exhaustion (timeouts, 5xx, rate limits).
    #[error("provider request failed after retries: {0}")]
    Transient(String),

    /// Fatal storage error; caller should fall back to a rebuild.
    #[error("storage error: {0}")]
    Storage(String),

    /// The requested symbol/unit was not found in the index.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation was cancelled before completion (spec.md §7, not an error).
    #[error("operation cancelled")]
    Cancelled,

    /// Config-crate error surfaced unchanged.
    #[error("configuration error: {0}")]
    Config(#[from] claudemem_config::ConfigError),

    /// I/O error (file reads during indexing, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error talking to a chat provider.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}
