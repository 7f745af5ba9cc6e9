//! Embed provider abstraction (spec.md §4.1).
//!
//! A single [`EmbeddingProvider`] trait covers both the local Candle-backed
//! provider and every remote HTTP-based one; [`factory::create`] dispatches
//! between them from a `namespace/model` spec string so callers never pick a
//! provider type directly.
//!
//! ```text
//! EmbeddingProvider (trait)
//!     ├── LocalProvider   - Candle + Jina embeddings v2 code model
//!     └── RemoteProvider  - OpenRouter / Voyage / Ollama / LMStudio over HTTP
//! ```

pub mod factory;
pub mod jina_bert_v2;
mod local;
mod provider;
mod remote;

pub use factory::create as create_provider;
pub use local::{LocalProvider, EMBEDDING_DIM};
pub use provider::{
    price_per_million, truncate_to_budget, EmbedOutcome, EmbeddingProvider, ModelSpec,
    ProgressCallback, ProviderStatus, UsageRecord,
};
pub use remote::RemoteProvider;
