//! Local backend: the single [`Backend`] implementation, wiring together
//! discovery, extraction, enrichment, embedding, the symbol graph, PageRank,
//! and the index store into the indexing and retrieval data flows of
//! spec.md §2.
//!
//! One [`LocalBackend`] owns one project's [`IndexStore`] plus an in-memory
//! [`SymbolGraph`] snapshot rebuilt after every indexing run (spec.md §5
//! ordering guarantee b: edges are only built once extraction has finished
//! for every file).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rayon::prelude::*;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use claudemem_config::ClaudememConfig;
use claudemem_core::{
    compute_pagerank, detect_changes, AstExtractor, CodeParser, CodeUnit, FileDescriptor, PageRankConfig,
    SourceDiscovery, SymbolGraph, UnitType,
};
use claudemem_search::embeddings::{self, EmbeddingProvider, ProviderStatus};
use claudemem_search::{FeedbackEvent, IndexStore, QueryFilters, Retriever, RetrieverConfig, SearchResult};

use crate::analysis::AnalysisEngine;
use crate::enrichment::quality::{QualityContext, QualityStrategy, RetrievalRankStrategy};
use crate::enrichment::refinement::ProgressCallback as RefinementProgressCallback;
use crate::enrichment::EnrichmentPipeline;
use crate::error::BackendError;
use crate::providers::{self, ChatProvider};
use crate::traits::{Backend, IndexProgressCallback};
use crate::types::{
    DeadCodeEntry, ImpactResult, IndexReport, IndexStatus, NeighborEntry, SearchOptions, TestGapEntry, UnitSummary,
};

pub type Result<T> = std::result::Result<T, BackendError>;

/// Candidate pool multiplier for `map(query)`'s semantic pre-filter, mirroring
/// the retriever's own candidate-pool sizing (spec.md §4.9).
const MAP_QUERY_CANDIDATE_MULTIPLIER: usize = 5;

/// Local backend: direct file-system discovery plus a single project-scoped
/// [`IndexStore`] (spec.md §4.8's "single-writer" store, one per project).
pub struct LocalBackend {
    workspace_root: PathBuf,
    config: ClaudememConfig,
    store: Arc<IndexStore>,
    embed_provider: Arc<dyn EmbeddingProvider>,
    /// Rebuilt wholesale after every indexing run; readers take a read lock
    /// (spec.md §5 shared-resource policy: readers see the previous
    /// snapshot until a commit point advances the visible version).
    graph: RwLock<Arc<SymbolGraph>>,
    /// Adaptive retrieval-weight state shared across the per-query
    /// [`Retriever`] instances `retriever()` constructs, so the mix persists
    /// for the lifetime of this backend rather than resetting every search
    /// (spec.md §4.9).
    retrieval_weights: Arc<Mutex<(f64, f64, f64)>>,
    retrieval_components: Arc<Mutex<HashMap<String, (f64, f64, f64)>>>,
}

impl LocalBackend {
    /// Open (or create) the project's index store under `<workspace_root>/<storage.dir_name>`
    /// and load its current symbol graph.
    pub async fn new(config: &ClaudememConfig, workspace_root: impl AsRef<Path>) -> Result<Self> {
        let workspace_root = workspace_root.as_ref().to_path_buf();
        let db_path = config.index_dir(&workspace_root).join("claudemem.db");
        let store = Arc::new(IndexStore::open(&db_path)?);

        let embed_provider =
            embeddings::create_provider(&config.default_embed_model).map_err(BackendError::Search)?;

        let units = store.iter_all()?;
        let graph = SymbolGraph::build(&units);

        let retrieval_weights = (
            config.retrieval.dense_weight,
            config.retrieval.lexical_weight,
            config.retrieval.pagerank_weight,
        );

        Ok(Self {
            workspace_root,
            config: config.clone(),
            store,
            embed_provider,
            graph: RwLock::new(Arc::new(graph)),
            retrieval_weights: Arc::new(Mutex::new(retrieval_weights)),
            retrieval_components: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn chat_provider(&self) -> Result<Arc<dyn ChatProvider>> {
        providers::create(&self.config.default_chat_model).map_err(Into::into)
    }

    fn retriever(&self, top_k_override: Option<usize>) -> Retriever {
        Retriever::with_shared_state(
            self.store.clone(),
            Some(self.embed_provider.clone()),
            RetrieverConfig {
                dense_weight: self.config.retrieval.dense_weight,
                lexical_weight: self.config.retrieval.lexical_weight,
                pagerank_weight: self.config.retrieval.pagerank_weight,
                top_k: top_k_override.unwrap_or(self.config.retrieval.top_k),
                adaptive: self.config.retrieval.adaptive,
            },
            self.retrieval_weights.clone(),
            self.retrieval_components.clone(),
        )
    }

    fn analysis(&self, graph: &SymbolGraph) -> AnalysisEngine<'_> {
        AnalysisEngine::new(&self.store, graph, self.config.analysis)
    }

    /// Reference queries a reviewer might type looking for this unit, used
    /// by the retrieval-rank quality strategy (spec.md §4.4). Derived from
    /// the unit's own name/signature rather than a held-out query set, since
    /// the engine has no external query log to draw from at index time.
    fn reference_queries_for(unit: &CodeUnit) -> Vec<String> {
        let mut queries = Vec::new();
        if let Some(name) = &unit.name {
            queries.push(name.clone());
            queries.push(format!("what does {name} do"));
        }
        if let Some(sig) = &unit.signature {
            queries.push(sig.clone());
        }
        queries
    }

    /// Rebuilds the in-memory symbol graph and PageRank scores from the
    /// store's current unit set, persists scores and edges, and swaps the
    /// visible snapshot (spec.md §5 ordering guarantee b, §4.7).
    async fn rebuild_graph(&self) -> Result<usize> {
        let units = self.store.iter_all()?;
        let graph = SymbolGraph::build(&units);

        let adjacency = graph.adjacency();
        let scores = compute_pagerank(&adjacency, &PageRankConfig::default(), None);

        // spec.md §4.6's second pass: re-resolve ambiguous same-name
        // references by PageRank instead of lexicographic order, then
        // recompute PageRank over the rebuilt graph so the persisted scores
        // match the edges actually stored (spec.md §9 open question).
        let (graph, scores) = if self.config.graph.second_pass_resolution {
            let hints = graph.rerank_candidates(&scores);
            if hints.is_empty() {
                (graph, scores)
            } else {
                let graph = SymbolGraph::build_with_hints(&units, &hints);
                let adjacency = graph.adjacency();
                let scores = compute_pagerank(&adjacency, &PageRankConfig::default(), None);
                (graph, scores)
            }
        } else {
            (graph, scores)
        };

        for unit in &units {
            if let Some(&score) = scores.get(&unit.id) {
                let mut updated = unit.clone();
                updated.pagerank = Some(score);
                self.store.upsert(&updated)?;
            }
        }

        let edges: Vec<_> = graph.edges().cloned().collect();
        let edge_count = edges.len();
        self.store.replace_edges(&edges)?;

        *self.graph.write().await = Arc::new(graph);
        Ok(edge_count)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        let graph = self.graph.read().await;
        let filters = QueryFilters {
            language: options.language.clone(),
            path_glob: options.path_glob.clone(),
            unit_type: options.unit_type,
        };
        let retriever = self.retriever(options.top_k);
        let results = retriever.search(query, options.mode, &filters, Some(&graph)).await?;
        Ok(results)
    }

    async fn map(&self, query: Option<&str>, limit: usize) -> Result<Vec<UnitSummary>> {
        let graph = self.graph.read().await;
        let candidate_ids = match query {
            None => None,
            Some(q) if q.trim().is_empty() => None,
            Some(q) => {
                let outcome = self.embed_provider.embed(vec![q.to_string()], None).await?;
                let Some(vector) = outcome.vectors.into_iter().next().filter(|v| !v.is_empty()) else {
                    return Ok(Vec::new());
                };
                let pool = limit * MAP_QUERY_CANDIDATE_MULTIPLIER;
                let hits = self.store.knn(&vector, pool, &QueryFilters::default())?;
                Some(hits.into_iter().map(|h| h.unit.id).collect::<Vec<_>>())
            }
        };
        self.analysis(&graph).map(candidate_ids.as_deref(), limit)
    }

    async fn callers(&self, symbol: &str) -> Result<Vec<NeighborEntry>> {
        let graph = self.graph.read().await;
        self.analysis(&graph).callers(symbol)
    }

    async fn callees(&self, symbol: &str) -> Result<Vec<NeighborEntry>> {
        let graph = self.graph.read().await;
        self.analysis(&graph).callees(symbol)
    }

    async fn impact(&self, symbol: &str) -> Result<ImpactResult> {
        let graph = self.graph.read().await;
        self.analysis(&graph).impact(symbol)
    }

    async fn dead_code(&self, include_exported: bool, max_pagerank: Option<f64>) -> Result<Vec<DeadCodeEntry>> {
        let graph = self.graph.read().await;
        self.analysis(&graph).dead_code(include_exported, max_pagerank)
    }

    async fn test_gaps(&self) -> Result<Vec<TestGapEntry>> {
        let graph = self.graph.read().await;
        self.analysis(&graph).test_gaps()
    }

    async fn index(
        &self,
        force: bool,
        cancellation: CancellationToken,
        progress: Option<&IndexProgressCallback>,
        refinement_progress: Option<&RefinementProgressCallback>,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();

        if force {
            info!("force reindex requested; clearing existing index");
            self.store.clear()?;
        }

        let discovery = SourceDiscovery::default();
        let files = discovery
            .discover(&self.workspace_root)
            .map_err(|e| BackendError::Core(e.to_string()))?;

        let previous_hashes = self.store.file_hashes()?;
        let changes = detect_changes(&previous_hashes, &files);

        if !changes.has_changes() {
            debug!("no file changes detected; index is up to date");
            return Ok(report);
        }

        for deleted in &changes.deleted {
            self.store.delete_file(deleted)?;
            report.files_deleted += 1;
        }

        let to_process: Vec<_> = files
            .iter()
            .filter(|f| changes.added.contains(&f.relative_path) || changes.modified.contains(&f.relative_path))
            .collect();
        let total = to_process.len();

        let chat = if self.config.refinement.enabled {
            Some(self.chat_provider()?)
        } else {
            None
        };
        let quality: Option<Arc<dyn QualityStrategy>> = chat.as_ref().map(|_| {
            Arc::new(RetrievalRankStrategy::new(
                self.embed_provider.clone(),
                self.config.refinement.target_rank,
            )) as Arc<dyn QualityStrategy>
        });
        let enrichment = chat
            .map(|c| EnrichmentPipeline::new(c, quality, self.config.refinement.max_rounds));

        // Reading, parsing, and unit extraction are pure CPU-bound work with
        // no cross-file dependency, so they run across a rayon pool (spec.md
        // §5: "Parallel threads for CPU-bound work (AST parsing...)").
        // Enrichment, embedding, and persistence stay sequential below since
        // they touch the shared store and external providers.
        let parsed: Vec<(&FileDescriptor, Vec<CodeUnit>)> = to_process
            .par_iter()
            .filter_map(|file| {
                let source = match std::fs::read_to_string(&file.path) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("skipping unreadable file {:?}: {}", file.path, e);
                        return None;
                    }
                };
                // Parse failure is non-fatal: the extractor falls back to a
                // single file-level unit (spec.md §4.3 failure mode, §7 Parse).
                let mut parser = CodeParser::for_path(&file.path).ok();
                let tree = parser.as_mut().and_then(|p| p.parse(&source).ok());
                let units = AstExtractor::extract(file, &source, tree.as_ref());
                Some((*file, units))
            })
            .collect();

        for (idx, (file, mut units)) in parsed.into_iter().enumerate() {
            if cancellation.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if changes.modified.contains(&file.relative_path) {
                self.store.delete_file(&file.relative_path)?;
            }

            for unit in units.iter_mut().filter(|u| u.unit_type != UnitType::File) {
                let Some(pipeline) = &enrichment else { continue };
                let reference_queries = Self::reference_queries_for(unit);
                let context = QualityContext {
                    unit,
                    reference_queries: &reference_queries,
                    candidate_pool: &[],
                };
                match pipeline.enrich(&context, &cancellation, refinement_progress).await {
                    Ok(outcome) => {
                        unit.summary = Some(outcome.summary);
                        report.units_enriched += 1;
                    }
                    Err(BackendError::Cancelled) => {
                        report.cancelled = true;
                    }
                    Err(e) => warn!("enrichment failed for unit {}: {}", unit.id, e),
                }
            }

            let texts: Vec<String> = units
                .iter()
                .map(|u| format!("{}\n{}", u.content, u.summary.as_deref().unwrap_or_default()))
                .collect();
            if !texts.is_empty() {
                let outcome = self.embed_provider.embed(texts, None).await?;
                report.cost_usd += outcome.cost_usd.unwrap_or(0.0);
                for (unit, vector) in units.iter_mut().zip(outcome.vectors) {
                    if vector.is_empty() {
                        continue;
                    }
                    if vector.len() != self.embed_provider.embedding_dim() {
                        warn!(
                            "dropping embedding for {} with mismatched dimension {} != {}",
                            unit.id,
                            vector.len(),
                            self.embed_provider.embedding_dim()
                        );
                        continue;
                    }
                    unit.embedding = Some(vector);
                    report.units_embedded += 1;
                }
            }

            for unit in &units {
                self.store.upsert(unit)?;
            }
            self.store.record_file_hash(&file.relative_path, &file.content_hash)?;

            if changes.added.contains(&file.relative_path) {
                report.files_added += 1;
            } else {
                report.files_modified += 1;
            }
            report.units_indexed += units.len();

            if let Some(cb) = progress {
                cb(idx + 1, total);
            }
        }

        self.store
            .set_embedding_model(&self.config.default_embed_model, self.embed_provider.embedding_dim())?;
        report.edges_built = self.rebuild_graph().await?;

        Ok(report)
    }

    async fn index_status(&self) -> Result<IndexStatus> {
        let unit_count = self.store.count()?;
        let file_count = self.store.file_hashes()?.len();
        let graph = self.graph.read().await;
        Ok(IndexStatus {
            unit_count,
            file_count,
            edge_count: graph.edge_count(),
            embedding_model: Some(self.config.default_embed_model.clone()),
            embedding_dimension: self.store.embedding_dimension()?,
            schema_version: self.config.storage.schema_version as i64,
        })
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear()?;
        *self.graph.write().await = Arc::new(SymbolGraph::new());
        Ok(())
    }

    async fn check_provider(&self) -> Result<ProviderStatus> {
        Ok(self.embed_provider.check_status().await?)
    }

    fn record_feedback(&self, event: FeedbackEvent) {
        // Shares `retrieval_weights`/`retrieval_components` with every
        // `Retriever` this backend constructs, so the adjustment made here
        // is visible to the next `search()` call regardless of which
        // `Retriever` instance served the query that produced `event`.
        self.retriever(None).record_feedback(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn backend_for(root: &Path) -> LocalBackend {
        let mut config = ClaudememConfig::default();
        config.default_embed_model = "local/jina-code".to_string();
        config.refinement.enabled = false;
        LocalBackend::new(&config, root).await.unwrap()
    }

    #[tokio::test]
    async fn empty_project_indexes_to_empty_store() {
        let temp = TempDir::new().unwrap();
        let backend = backend_for(temp.path()).await;
        let report = backend
            .index(false, CancellationToken::new(), None, None)
            .await
            .unwrap();
        assert_eq!(report.units_indexed, 0);
        let status = backend.index_status().await.unwrap();
        assert_eq!(status.unit_count, 0);
    }

    #[tokio::test]
    async fn indexing_is_idempotent_on_unchanged_tree() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.py"), "def validate(token):\n    return True\n").unwrap();
        let backend = backend_for(temp.path()).await;

        let first = backend.index(false, CancellationToken::new(), None, None).await.unwrap();
        assert!(first.units_indexed > 0);

        let second = backend.index(false, CancellationToken::new(), None, None).await.unwrap();
        assert_eq!(second.files_added, 0);
        assert_eq!(second.files_modified, 0);
        assert_eq!(second.units_indexed, 0);
    }

    #[tokio::test]
    async fn feedback_persists_across_retriever_instances() {
        use claudemem_search::FeedbackSignal;

        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.py"), "def validate(token):\n    return True\n").unwrap();
        let backend = backend_for(temp.path()).await;
        backend.index(false, CancellationToken::new(), None, None).await.unwrap();

        let results = backend
            .search("validate", SearchOptions::default())
            .await
            .unwrap();
        assert!(!results.is_empty());
        let unit_id = results[0].unit_id.clone();

        let before = backend.retriever(None).current_weights();
        backend.record_feedback(FeedbackEvent {
            unit_id,
            signal: FeedbackSignal::Helpful,
        });
        // `retriever()` constructs a fresh `Retriever` per call; the
        // adjustment above must still be visible through a brand new one,
        // proving the weight state is shared rather than per-instance.
        let after = backend.retriever(None).current_weights();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn reindex_after_edit_replaces_only_that_files_units() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.py"), "def a():\n    return 1\n").unwrap();
        std::fs::write(temp.path().join("b.py"), "def b():\n    return 2\n").unwrap();
        let backend = backend_for(temp.path()).await;
        backend.index(false, CancellationToken::new(), None, None).await.unwrap();

        let status_path = backend.store.iter_by_file("b.py").unwrap();
        let b_id_before = status_path[0].id.clone();

        std::fs::write(temp.path().join("a.py"), "def a():\n    return 99\n").unwrap();
        backend.index(false, CancellationToken::new(), None, None).await.unwrap();

        let b_units_after = backend.store.iter_by_file("b.py").unwrap();
        assert_eq!(b_units_after[0].id, b_id_before);
    }

    #[tokio::test]
    async fn clear_empties_store_and_graph() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.py"), "def a():\n    return 1\n").unwrap();
        let backend = backend_for(temp.path()).await;
        backend.index(false, CancellationToken::new(), None, None).await.unwrap();
        assert!(backend.store.count().unwrap() > 0);

        backend.clear().await.unwrap();
        assert_eq!(backend.store.count().unwrap(), 0);
        assert_eq!(backend.graph.read().await.node_count(), 0);
    }
}
