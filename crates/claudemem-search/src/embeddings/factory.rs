//! Prefix-based embed provider dispatch (spec.md §4.1).
//!
//! A `namespace/model` spec string is routed to [`local::LocalProvider`]
//! when its namespace is `local`, and to [`remote::RemoteProvider`]
//! otherwise. This is the auto-detection the spec calls mandatory: callers
//! never choose a provider type directly, only a model spec string.

use std::sync::Arc;

use super::local::LocalProvider;
use super::provider::{EmbeddingProvider, ModelSpec};
use super::remote::RemoteProvider;
use crate::error::Result;

/// Create the embed provider implied by `spec` (e.g. `local/jina-code`,
/// `voyage-code-3`, `openrouter/qwen3-embedding-8b`, `ollama/nomic-embed-text`).
pub fn create(spec: &str) -> Result<Arc<dyn EmbeddingProvider>> {
    let model_spec = ModelSpec::parse(spec);
    if model_spec.is_local() {
        Ok(Arc::new(LocalProvider::new(model_spec)?))
    } else {
        Ok(Arc::new(RemoteProvider::new(model_spec)?))
    }
}
