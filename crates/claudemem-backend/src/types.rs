//! Shared request/response types for [`crate::traits::Backend`] operations
//! (spec.md §4.9–§4.11).

use serde::{Deserialize, Serialize};

use claudemem_core::UnitType;
use claudemem_search::RetrievalMode;

/// Search-time filters and overrides, mirroring [`claudemem_search::QueryFilters`]
/// plus the retrieval-mode override and top-k the CLI/tool server expose.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub language: Option<String>,
    pub path_glob: Option<String>,
    pub unit_type: Option<UnitType>,
    pub mode: RetrievalMode,
    pub top_k: Option<usize>,
}

/// Snapshot of the index store's contents and freshness (`claudemem status`,
/// tool server `index_status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub unit_count: usize,
    pub file_count: usize,
    pub edge_count: usize,
    pub embedding_model: Option<String>,
    pub embedding_dimension: Option<usize>,
    pub schema_version: i64,
}

/// One entry in a `map`/`dead-code`/`test-gaps` listing: a unit identified by
/// id plus the facts the command cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSummary {
    pub unit_id: String,
    pub name: Option<String>,
    pub unit_type: UnitType,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<String>,
    pub pagerank: f64,
}

/// `callers`/`callees` result: the neighbor unit plus the edge that connects
/// it to the queried symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub unit: UnitSummary,
    pub edge_type: String,
    pub occurrences: u32,
}

/// `impact(symbol)` result: the transitive closure over inverse reference
/// edges, bounded by depth and node count (spec.md §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactResult {
    pub root_unit_id: String,
    pub affected: Vec<UnitSummary>,
    pub truncated: bool,
}

/// `dead-code` result entry: zero incoming reference edges and PageRank
/// below threshold.
pub type DeadCodeEntry = UnitSummary;

/// `test-gaps` result entry: PageRank above threshold with no referencing
/// unit in a recognized test directory.
pub type TestGapEntry = UnitSummary;

/// Summary of one `index`/`update` run (spec.md §4.2 indexing pipeline, §6 `claudemem index`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    pub files_added: usize,
    pub files_modified: usize,
    pub files_deleted: usize,
    pub units_indexed: usize,
    pub edges_built: usize,
    pub units_enriched: usize,
    pub units_embedded: usize,
    pub cost_usd: f64,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_options_default_to_hybrid_mode() {
        let opts = SearchOptions::default();
        assert_eq!(opts.mode, RetrievalMode::Hybrid);
    }
}
