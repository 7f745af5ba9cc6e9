//! Analysis queries: map, callers, callees, dead-code, test-gaps, impact
//! (spec.md §4.10). Thin wrappers over [`claudemem_core::SymbolGraph`] and
//! [`claudemem_search::IndexStore`]; no new traversal logic lives here beyond
//! symbol resolution and threshold filtering.

use claudemem_config::AnalysisConfig;
use claudemem_core::{CodeUnit, EdgeType, SymbolGraph};
use claudemem_search::IndexStore;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::BackendError;
use crate::types::{DeadCodeEntry, ImpactResult, NeighborEntry, TestGapEntry, UnitSummary};

pub type Result<T> = std::result::Result<T, BackendError>;

/// Path segments recognized as test/spec directories (spec.md §4.10 test-gaps).
static TEST_PATH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|/)(tests?|specs?|__tests__)(/|$)").unwrap());

fn to_summary(unit: &CodeUnit) -> UnitSummary {
    UnitSummary {
        unit_id: unit.id.clone(),
        name: unit.name.clone(),
        unit_type: unit.unit_type,
        file_path: unit.file_path.clone(),
        start_line: unit.start_line,
        end_line: unit.end_line,
        signature: unit.signature.clone(),
        pagerank: unit.pagerank.unwrap_or(0.0),
    }
}

/// Analysis queries over a consistent `(store, graph)` snapshot.
pub struct AnalysisEngine<'a> {
    store: &'a IndexStore,
    graph: &'a SymbolGraph,
    config: AnalysisConfig,
}

impl<'a> AnalysisEngine<'a> {
    pub fn new(store: &'a IndexStore, graph: &'a SymbolGraph, config: AnalysisConfig) -> Self {
        Self { store, graph, config }
    }

    /// Resolve a symbol given as a unit id or a bare name. Ambiguous names
    /// resolve to the highest-PageRank candidate (spec.md §4.6 tie-break).
    pub fn resolve_symbol(&self, symbol: &str) -> Result<CodeUnit> {
        if let Some(unit) = self.store.find_by_id(symbol)? {
            return Ok(unit);
        }
        let candidates = self
            .store
            .iter_all()?
            .into_iter()
            .filter(|u| u.name.as_deref() == Some(symbol))
            .collect::<Vec<_>>();
        candidates
            .into_iter()
            .max_by(|a, b| {
                a.pagerank
                    .unwrap_or(0.0)
                    .partial_cmp(&b.pagerank.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| BackendError::not_found(symbol))
    }

    /// The highest-PageRank units, optionally restricted to `candidate_ids`
    /// (spec.md §4.10 map; semantic filtering, when requested, is applied by
    /// the caller before invoking this with the matched ids).
    pub fn map(&self, candidate_ids: Option<&[String]>, limit: usize) -> Result<Vec<UnitSummary>> {
        let mut units = match candidate_ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.store.find_by_id(id).ok().flatten())
                .collect::<Vec<_>>(),
            None => self.store.iter_all()?,
        };
        units.sort_by(|a, b| {
            b.pagerank
                .unwrap_or(0.0)
                .partial_cmp(&a.pagerank.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        units.truncate(limit);
        Ok(units.iter().map(to_summary).collect())
    }

    fn neighbors(&self, symbol: &str, incoming: bool) -> Result<Vec<NeighborEntry>> {
        let unit = self.resolve_symbol(symbol)?;
        let mut entries = Vec::new();
        for edge_type in [EdgeType::Calls, EdgeType::References, EdgeType::Imports, EdgeType::Extends] {
            let edges = if incoming {
                self.graph.incoming(&unit.id, edge_type)
            } else {
                self.graph.outgoing(&unit.id, edge_type)
            };
            for edge in edges {
                let neighbor_id = if incoming { &edge.source } else { &edge.target };
                let Some(neighbor) = self.store.find_by_id(neighbor_id)? else {
                    continue;
                };
                entries.push(NeighborEntry {
                    unit: to_summary(&neighbor),
                    edge_type: edge_type.as_str().to_string(),
                    occurrences: edge.occurrences,
                });
            }
        }
        Ok(entries)
    }

    /// One-hop callers (spec.md §4.10 callers).
    pub fn callers(&self, symbol: &str) -> Result<Vec<NeighborEntry>> {
        self.neighbors(symbol, true)
    }

    /// One-hop callees (spec.md §4.10 callees).
    pub fn callees(&self, symbol: &str) -> Result<Vec<NeighborEntry>> {
        self.neighbors(symbol, false)
    }

    /// Units with zero incoming reference edges and PageRank below threshold
    /// (spec.md §4.10 dead-code). `max_pagerank` overrides the configured
    /// default when given (`claudemem dead-code --max-pagerank`, spec.md §6).
    pub fn dead_code(&self, include_exported: bool, max_pagerank: Option<f64>) -> Result<Vec<DeadCodeEntry>> {
        let threshold = max_pagerank.unwrap_or(self.config.dead_code_max_pagerank);
        let units = self.store.iter_all()?;
        let mut entries: Vec<DeadCodeEntry> = units
            .into_iter()
            .filter(|u| u.unit_type != claudemem_core::UnitType::File)
            .filter(|u| self.graph.incoming_count(&u.id) == 0)
            .filter(|u| u.pagerank.unwrap_or(0.0) < threshold)
            .filter(|u| include_exported || !u.ast_metadata.exported)
            .map(|u| to_summary(&u))
            .collect();
        entries.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        Ok(entries)
    }

    /// Units whose PageRank exceeds threshold with no referencing unit in a
    /// recognized test directory (spec.md §4.10 test-gaps).
    pub fn test_gaps(&self) -> Result<Vec<TestGapEntry>> {
        let units = self.store.iter_all()?;
        let mut entries = Vec::new();
        for unit in units {
            if unit.unit_type == claudemem_core::UnitType::File {
                continue;
            }
            if unit.pagerank.unwrap_or(0.0) <= self.config.test_gap_min_pagerank {
                continue;
            }
            let referenced_by_test = self
                .graph
                .incoming(&unit.id, EdgeType::References)
                .into_iter()
                .chain(self.graph.incoming(&unit.id, EdgeType::Calls))
                .any(|edge| {
                    self.store
                        .find_by_id(&edge.source)
                        .ok()
                        .flatten()
                        .map(|caller| TEST_PATH_PATTERN.is_match(&caller.file_path))
                        .unwrap_or(false)
                });
            if !referenced_by_test {
                entries.push(to_summary(&unit));
            }
        }
        entries.sort_by(|a, b| b.pagerank.partial_cmp(&a.pagerank).unwrap_or(std::cmp::Ordering::Equal));
        Ok(entries)
    }

    /// Transitive closure over inverse reference edges, bounded by depth and
    /// node count (spec.md §4.10 impact).
    pub fn impact(&self, symbol: &str) -> Result<ImpactResult> {
        let unit = self.resolve_symbol(symbol)?;
        let affected_ids = self
            .graph
            .impact(&unit.id, self.config.impact_max_depth, self.config.impact_max_nodes);
        let truncated = affected_ids.len() >= self.config.impact_max_nodes;
        let mut affected: Vec<UnitSummary> = affected_ids
            .iter()
            .filter_map(|id| self.store.find_by_id(id).ok().flatten())
            .map(|u| to_summary(&u))
            .collect();
        affected.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        Ok(ImpactResult {
            root_unit_id: unit.id,
            affected,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudemem_core::{AstMetadata, UnitType};

    fn unit(id: &str, name: &str, file: &str, pagerank: f64, exported: bool) -> CodeUnit {
        CodeUnit {
            id: id.to_string(),
            parent_id: None,
            unit_type: UnitType::Function,
            file_path: file.to_string(),
            start_line: 1,
            end_line: 2,
            language: "python".to_string(),
            depth: 1,
            name: Some(name.to_string()),
            signature: None,
            content: "def f(): pass".to_string(),
            file_hash: "h".to_string(),
            ast_metadata: AstMetadata {
                exported,
                ..Default::default()
            },
            summary: None,
            embedding: None,
            pagerank: Some(pagerank),
        }
    }

    #[test]
    fn dead_code_requires_zero_incoming_and_low_pagerank() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&unit("a", "dead", "f.py", 0.0004, false)).unwrap();
        store.upsert(&unit("b", "live", "f.py", 0.5, false)).unwrap();
        let units = store.iter_all().unwrap();
        let graph = SymbolGraph::build(&units);

        let engine = AnalysisEngine::new(&store, &graph, AnalysisConfig::default());
        let entries = engine.dead_code(false, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].unit_id, "a");
    }

    #[test]
    fn test_gaps_excludes_units_referenced_from_test_directory() {
        let store = IndexStore::open_in_memory().unwrap();
        store.upsert(&unit("impl", "validate", "src/auth.py", 0.5, true)).unwrap();
        let mut tested_caller = unit("test_caller", "test_validate", "tests/test_auth.py", 0.01, true);
        tested_caller.ast_metadata.referenced_symbols = vec!["validate".to_string()];
        store.upsert(&tested_caller).unwrap();

        let mut other = unit("other_impl", "process", "src/other.py", 0.5, true);
        other.id = "other_impl".to_string();
        store.upsert(&other).unwrap();

        let units = store.iter_all().unwrap();
        let graph = SymbolGraph::build(&units);
        let engine = AnalysisEngine::new(&store, &graph, AnalysisConfig::default());
        let gaps = engine.test_gaps().unwrap();

        assert!(gaps.iter().any(|g| g.unit_id == "other_impl"));
        assert!(!gaps.iter().any(|g| g.unit_id == "impl"));
    }

    #[test]
    fn impact_resolves_symbol_by_name() {
        let store = IndexStore::open_in_memory().unwrap();
        let mut a = unit("a", "caller", "f.py", 0.1, true);
        a.ast_metadata.referenced_symbols = vec!["callee".to_string()];
        store.upsert(&a).unwrap();
        store.upsert(&unit("b", "callee", "f.py", 0.1, true)).unwrap();

        let units = store.iter_all().unwrap();
        let graph = SymbolGraph::build(&units);
        let engine = AnalysisEngine::new(&store, &graph, AnalysisConfig::default());
        let result = engine.impact("callee").unwrap();
        assert_eq!(result.root_unit_id, "b");
        assert_eq!(result.affected.len(), 1);
        assert_eq!(result.affected[0].unit_id, "a");
    }

    #[test]
    fn resolve_symbol_fails_for_unknown() {
        let store = IndexStore::open_in_memory().unwrap();
        let graph = SymbolGraph::new();
        let engine = AnalysisEngine::new(&store, &graph, AnalysisConfig::default());
        assert!(matches!(engine.resolve_symbol("nope"), Err(BackendError::NotFound(_))));
    }
}
