//! Backend: the orchestration layer wiring discovery, extraction,
//! enrichment, embedding, the symbol graph, PageRank, and the index store
//! into the operations the CLI and tool server expose (spec.md §2, §4).
//!
//! ## Layout
//!
//! - [`traits::Backend`]: the single interface the CLI and tool server drive.
//! - [`local::LocalBackend`]: the only implementation — a project-scoped
//!   index store plus an in-memory symbol graph snapshot.
//! - [`analysis`]: map/callers/callees/dead-code/test-gaps/impact queries.
//! - [`enrichment`]: LLM summary generation and iterative refinement.
//! - [`providers`]: the chat half of the provider-adapter capability (the
//!   embed half lives in `claudemem_search::embeddings`).
//!
//! ```ignore
//! use claudemem_backend::{Backend, LocalBackend};
//! use claudemem_config::ClaudememConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClaudememConfig::default();
//!     let backend = LocalBackend::new(&config, "/path/to/project").await?;
//!     let results = backend.search("authentication logic", Default::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod enrichment;
mod error;
mod local;
pub mod providers;
mod traits;
mod types;

#[cfg(test)]
mod tests_support;

pub use claudemem_search::embeddings::ProviderStatus;
pub use error::BackendError;
pub use local::LocalBackend;
pub use traits::{Backend, IndexProgressCallback};
pub use types::*;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
