//! Backend trait definition (spec.md §4.2, §4.9, §4.10).
//!
//! One async interface implemented by [`crate::local::LocalBackend`], the
//! CLI and tool server drive everything through this trait rather than
//! touching the store/graph/providers directly.

use async_trait::async_trait;
use claudemem_search::embeddings::ProviderStatus;
use claudemem_search::{FeedbackEvent, SearchResult};
use tokio_util::sync::CancellationToken;

use crate::enrichment::refinement::ProgressCallback;
use crate::error::BackendError;
use crate::types::{
    DeadCodeEntry, ImpactResult, IndexReport, IndexStatus, NeighborEntry, SearchOptions, TestGapEntry, UnitSummary,
};

pub type Result<T> = std::result::Result<T, BackendError>;

/// Invoked with `(files_processed, files_total)` during [`Backend::index`].
pub type IndexProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Hybrid search (spec.md §4.9).
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>>;

    /// Highest-PageRank units, optionally restricted to matches of `query`
    /// (spec.md §4.10 map).
    async fn map(&self, query: Option<&str>, limit: usize) -> Result<Vec<UnitSummary>>;

    /// One-hop callers of `symbol` (spec.md §4.10).
    async fn callers(&self, symbol: &str) -> Result<Vec<NeighborEntry>>;

    /// One-hop callees of `symbol` (spec.md §4.10).
    async fn callees(&self, symbol: &str) -> Result<Vec<NeighborEntry>>;

    /// Transitive closure over inverse reference edges from `symbol` (spec.md §4.10).
    async fn impact(&self, symbol: &str) -> Result<ImpactResult>;

    /// Units with no incoming references and low PageRank (spec.md §4.10).
    /// `max_pagerank` overrides the configured threshold when given.
    async fn dead_code(&self, include_exported: bool, max_pagerank: Option<f64>) -> Result<Vec<DeadCodeEntry>>;

    /// Units above the importance threshold with no test-directory referent (spec.md §4.10).
    async fn test_gaps(&self) -> Result<Vec<TestGapEntry>>;

    /// Run discovery, extraction, enrichment, embedding, and graph/PageRank
    /// rebuild over changed files (spec.md §4.2, §5). Incremental by default;
    /// `force` discards all previously recorded state first.
    async fn index(
        &self,
        force: bool,
        cancellation: CancellationToken,
        progress: Option<&IndexProgressCallback>,
        refinement_progress: Option<&ProgressCallback>,
    ) -> Result<IndexReport>;

    async fn index_status(&self) -> Result<IndexStatus>;

    /// Project-scoped clear (spec.md §4.8, §6 `claudemem clean`).
    async fn clear(&self) -> Result<()>;

    /// Check the configured embed provider's readiness (`claudemem doctor`).
    async fn check_provider(&self) -> Result<ProviderStatus>;

    /// Record an explicit feedback signal about a previously-returned search
    /// result, drifting the per-project adaptive fusion weights (spec.md
    /// §4.9). A no-op when the unit was never returned by a hybrid search.
    fn record_feedback(&self, event: FeedbackEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn Backend) {}
}
