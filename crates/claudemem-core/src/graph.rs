//! Symbol Graph Builder (spec.md §4.6).
//!
//! Resolves cross-unit references emitted by the AST extractor into typed
//! edges over a directed graph keyed by unit id. Resolution tries the
//! current file first, then a project-wide name index; ambiguous matches are
//! broken lexicographically on the first pass and, if a second pass is
//! configured, re-ranked by PageRank once it has been computed.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unit::CodeUnit;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unit id not found in graph: {0}")]
    UnitNotFound(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Symbol-graph edge type (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Calls,
    References,
    Imports,
    Extends,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Calls => "calls",
            EdgeType::References => "references",
            EdgeType::Imports => "imports",
            EdgeType::Extends => "extends",
        }
    }
}

/// A directed, typed edge between two unit ids with an occurrence count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
    pub occurrences: u32,
}

/// The symbol graph: units keyed by id, edges typed and counted.
///
/// Built fresh from a complete set of units after extraction finishes for
/// every file (spec.md §5 ordering guarantee b); incremental updates remove
/// a file's units/edges and re-resolve only what referenced them.
#[derive(Default)]
pub struct SymbolGraph {
    inner: DiGraph<String, Edge>,
    index_of: HashMap<String, NodeIndex>,
    /// name -> unit ids declaring that name, for cross-file resolution.
    name_index: HashMap<String, Vec<String>>,
}

impl SymbolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from the full unit set. Resolution order: file-local
    /// first, then project-wide by name, with ambiguities broken
    /// lexicographically (spec.md §4.6's first pass).
    pub fn build(units: &[CodeUnit]) -> Self {
        Self::build_inner(units, None)
    }

    /// Second-pass build: ambiguous cross-file name resolution prefers the
    /// id named in `hints` (as produced by [`rerank_candidates`] against a
    /// prior pass's PageRank scores) over the lexicographically-first
    /// candidate (spec.md §4.6's optional second pass, §9 open question).
    pub fn build_with_hints(units: &[CodeUnit], hints: &HashMap<String, String>) -> Self {
        Self::build_inner(units, Some(hints))
    }

    fn build_inner(units: &[CodeUnit], hints: Option<&HashMap<String, String>>) -> Self {
        let mut graph = Self::new();
        for unit in units {
            graph.add_unit(&unit.id);
        }
        graph.index_names(units);

        for unit in units {
            let candidates_in_file: Vec<&CodeUnit> = units
                .iter()
                .filter(|u| u.file_path == unit.file_path && u.id != unit.id)
                .collect();

            for name in &unit.ast_metadata.referenced_symbols {
                if name == unit.name.as_deref().unwrap_or_default() {
                    continue;
                }

                let target_id = candidates_in_file
                    .iter()
                    .find(|u| u.name.as_deref() == Some(name.as_str()))
                    .map(|u| u.id.clone())
                    .or_else(|| graph.resolve_by_name(name, hints));

                if let Some(target_id) = target_id {
                    if target_id != unit.id {
                        let edge_type = if unit.ast_metadata.called_symbols.iter().any(|c| c == name) {
                            EdgeType::Calls
                        } else {
                            EdgeType::References
                        };
                        graph.add_edge(&unit.id, &target_id, edge_type);
                    }
                }
            }

            for import in &unit.ast_metadata.imports {
                if let Some(target_id) = graph.resolve_by_name(import, hints) {
                    if target_id != unit.id {
                        graph.add_edge(&unit.id, &target_id, EdgeType::Imports);
                    }
                }
            }
        }

        graph.drop_dangling_edges();
        graph
    }

    /// Preferred unit id per ambiguous name, per spec.md §4.6's optional
    /// second pass: among units sharing a name, the one with the highest
    /// PageRank score wins instead of the lexicographically-first one.
    /// Callers rebuild the graph from scratch using these as resolution
    /// hints when a second pass is configured.
    pub fn rerank_candidates(&self, scores: &HashMap<String, f64>) -> HashMap<String, String> {
        let mut preferred = HashMap::new();
        for (name, ids) in &self.name_index {
            if ids.len() <= 1 {
                continue;
            }
            if let Some(best) = ids.iter().max_by(|a, b| {
                let sa = scores.get(*a).copied().unwrap_or(0.0);
                let sb = scores.get(*b).copied().unwrap_or(0.0);
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            }) {
                preferred.insert(name.clone(), best.clone());
            }
        }
        preferred
    }

    fn add_unit(&mut self, id: &str) {
        if !self.index_of.contains_key(id) {
            let idx = self.inner.add_node(id.to_string());
            self.index_of.insert(id.to_string(), idx);
        }
    }

    fn index_names(&mut self, units: &[CodeUnit]) {
        for unit in units {
            if let Some(name) = &unit.name {
                self.name_index
                    .entry(name.clone())
                    .or_default()
                    .push(unit.id.clone());
            }
        }
        for ids in self.name_index.values_mut() {
            ids.sort();
        }
    }

    /// Resolve a referenced name project-wide. When `hints` names a
    /// preferred id for this name (spec.md §4.6's second pass) that id wins
    /// as long as it is still a declared candidate; otherwise the
    /// lexicographically-first candidate wins.
    fn resolve_by_name(
        &self,
        name: &str,
        hints: Option<&HashMap<String, String>>,
    ) -> Option<String> {
        let candidates = self.name_index.get(name)?;
        if let Some(preferred) = hints.and_then(|h| h.get(name)) {
            if candidates.iter().any(|id| id == preferred) {
                return Some(preferred.clone());
            }
        }
        candidates.first().cloned()
    }

    /// Add an edge, aggregating occurrence counts and dropping self-edges
    /// and duplicates at the (source, target, type) level (spec.md §4.6).
    pub fn add_edge(&mut self, source: &str, target: &str, edge_type: EdgeType) {
        if source == target {
            return;
        }
        let Some(&src_idx) = self.index_of.get(source) else {
            return;
        };
        let Some(&tgt_idx) = self.index_of.get(target) else {
            return;
        };

        if let Some(edge_idx) = self.inner.find_edge(src_idx, tgt_idx) {
            if let Some(edge) = self.inner.edge_weight_mut(edge_idx) {
                if edge.edge_type == edge_type {
                    edge.occurrences += 1;
                    return;
                }
            }
        }

        self.inner.add_edge(
            src_idx,
            tgt_idx,
            Edge {
                source: source.to_string(),
                target: target.to_string(),
                edge_type,
                occurrences: 1,
            },
        );
    }

    /// Drop edges whose endpoints no longer exist. Edges are only ever added
    /// between indices already present in `index_of`, so this mainly guards
    /// the state left behind right after `remove_unit`.
    fn drop_dangling_edges(&mut self) {
        self.inner.retain_edges(|g, e| {
            let Some((a, b)) = g.edge_endpoints(e) else {
                return false;
            };
            g.node_weight(a).is_some() && g.node_weight(b).is_some()
        });
    }

    /// Remove a unit and all incident edges (spec.md §3 Lifecycle).
    pub fn remove_unit(&mut self, id: &str) {
        if let Some(idx) = self.index_of.remove(id) {
            self.inner.remove_node(idx);
            for ids in self.name_index.values_mut() {
                ids.retain(|i| i != id);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = &str> {
        self.index_of.keys().map(|s| s.as_str())
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.inner.edge_weights()
    }

    /// Outgoing edges of a given type from `id` (callees, or imports/extends targets).
    pub fn outgoing(&self, id: &str, edge_type: EdgeType) -> Vec<&Edge> {
        let Some(&idx) = self.index_of.get(id) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.weight())
            .filter(|e| e.edge_type == edge_type)
            .collect()
    }

    /// Incoming edges of a given type into `id` (callers, references-in).
    pub fn incoming(&self, id: &str, edge_type: EdgeType) -> Vec<&Edge> {
        let Some(&idx) = self.index_of.get(id) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.weight())
            .filter(|e| e.edge_type == edge_type)
            .collect()
    }

    pub fn incoming_count(&self, id: &str) -> usize {
        let Some(&idx) = self.index_of.get(id) else {
            return 0;
        };
        self.inner.edges_directed(idx, Direction::Incoming).count()
    }

    /// The adjacency the PageRank engine iterates: unit id -> outgoing targets.
    pub fn adjacency(&self) -> HashMap<String, Vec<String>> {
        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        for id in self.unit_ids() {
            out.entry(id.to_string()).or_default();
        }
        for edge in self.edges() {
            out.entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }
        out
    }

    /// Transitive closure over inverse reference edges, bounded by depth and
    /// visited-node count (spec.md §4.10 impact, §9 cyclic-graph note).
    pub fn impact(&self, id: &str, max_depth: usize, max_nodes: usize) -> Vec<String> {
        use std::collections::{HashSet, VecDeque};

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(id.to_string());
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((id.to_string(), 0));
        let mut result = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth || result.len() >= max_nodes {
                continue;
            }
            let Some(&idx) = self.index_of.get(&current) else {
                continue;
            };
            for edge in self.inner.edges_directed(idx, Direction::Incoming) {
                let source = &edge.weight().source;
                if visited.insert(source.clone()) {
                    result.push(source.clone());
                    if result.len() >= max_nodes {
                        break;
                    }
                    queue.push_back((source.clone(), depth + 1));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{AstMetadata, CodeUnit, UnitType};

    fn unit(id: &str, name: &str, file: &str, refs: Vec<&str>) -> CodeUnit {
        unit_with_calls(id, name, file, refs, vec![])
    }

    fn unit_with_calls(
        id: &str,
        name: &str,
        file: &str,
        refs: Vec<&str>,
        calls: Vec<&str>,
    ) -> CodeUnit {
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
                referenced_symbols: refs.into_iter().map(String::from).collect(),
                called_symbols: calls.into_iter().map(String::from).collect(),
                ..Default::default()
            },
            summary: None,
            embedding: None,
            pagerank: None,
        }
    }

    #[test]
    fn resolves_reference_within_file() {
        let units = vec![
            unit("a", "caller", "f.py", vec!["callee"]),
            unit("b", "callee", "f.py", vec![]),
        ];
        let graph = SymbolGraph::build(&units);
        let refs = graph.outgoing("a", EdgeType::References);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, "b");
    }

    #[test]
    fn call_expression_reference_classifies_as_calls_edge() {
        let units = vec![
            unit_with_calls("a", "caller", "f.py", vec!["callee"], vec!["callee"]),
            unit("b", "callee", "f.py", vec![]),
        ];
        let graph = SymbolGraph::build(&units);
        assert_eq!(graph.outgoing("a", EdgeType::References).len(), 0);
        let calls = graph.outgoing("a", EdgeType::Calls);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, "b");
    }

    #[test]
    fn plain_reference_without_call_stays_references_edge() {
        let units = vec![
            unit("a", "caller", "f.py", vec!["Helper"]),
            unit("b", "Helper", "f.py", vec![]),
        ];
        let graph = SymbolGraph::build(&units);
        assert_eq!(graph.outgoing("a", EdgeType::Calls).len(), 0);
        assert_eq!(graph.outgoing("a", EdgeType::References).len(), 1);
    }

    #[test]
    fn drops_self_edges() {
        let units = vec![unit("a", "a", "f.py", vec![])];
        let mut graph = SymbolGraph::build(&units);
        graph.add_edge("a", "a", EdgeType::Calls);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn aggregates_duplicate_edges() {
        let units = vec![
            unit("a", "caller", "f.py", vec![]),
            unit("b", "callee", "f.py", vec![]),
        ];
        let mut graph = SymbolGraph::build(&units);
        graph.add_edge("a", "b", EdgeType::Calls);
        graph.add_edge("a", "b", EdgeType::Calls);
        assert_eq!(graph.edge_count(), 1);
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges[0].occurrences, 2);
    }

    #[test]
    fn impact_transitive_closure() {
        let mut graph = SymbolGraph::new();
        for id in ["a", "b", "c", "d"] {
            graph.add_unit(id);
        }
        graph.add_edge("a", "b", EdgeType::Calls);
        graph.add_edge("b", "c", EdgeType::Calls);
        graph.add_edge("a", "d", EdgeType::Calls);

        let impacted = graph.impact("b", 10, 100);
        assert_eq!(impacted, vec!["a".to_string()]);
    }

    #[test]
    fn ambiguous_name_resolves_lexicographically_first_pass() {
        // "shared" is declared in both other.py (id "x-shared") and
        // z.py (id "z-shared"); the first pass has no scores to prefer by,
        // so lexicographic order picks "x-shared".
        let units = vec![
            unit("a", "caller", "a.py", vec!["shared"]),
            unit("x-shared", "shared", "other.py", vec![]),
            unit("z-shared", "shared", "z.py", vec![]),
        ];
        let graph = SymbolGraph::build(&units);
        let refs = graph.outgoing("a", EdgeType::References);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, "x-shared");
    }

    #[test]
    fn rerank_candidates_prefers_higher_pagerank() {
        let units = vec![
            unit("a", "caller", "a.py", vec!["shared"]),
            unit("x-shared", "shared", "other.py", vec![]),
            unit("z-shared", "shared", "z.py", vec![]),
        ];
        let graph = SymbolGraph::build(&units);

        let mut scores = HashMap::new();
        scores.insert("x-shared".to_string(), 0.1);
        scores.insert("z-shared".to_string(), 0.9);

        let hints = graph.rerank_candidates(&scores);
        assert_eq!(hints.get("shared"), Some(&"z-shared".to_string()));
    }

    #[test]
    fn build_with_hints_rewires_ambiguous_reference() {
        let units = vec![
            unit("a", "caller", "a.py", vec!["shared"]),
            unit("x-shared", "shared", "other.py", vec![]),
            unit("z-shared", "shared", "z.py", vec![]),
        ];

        let mut hints = HashMap::new();
        hints.insert("shared".to_string(), "z-shared".to_string());

        let graph = SymbolGraph::build_with_hints(&units, &hints);
        let refs = graph.outgoing("a", EdgeType::References);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, "z-shared");
    }

    #[test]
    fn remove_unit_drops_incident_edges() {
        let units = vec![
            unit("a", "caller", "f.py", vec!["callee"]),
            unit("b", "callee", "f.py", vec![]),
        ];
        let mut graph = SymbolGraph::build(&units);
        assert_eq!(graph.edge_count(), 1);
        graph.remove_unit("b");
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.contains("b"));
    }
}
