//! Retriever: hybrid dense+lexical+pagerank fusion with context expansion
//! (spec.md §4.9).
//!
//! A query is embedded once, then scored against three independent signals
//! over the same candidate pool: cosine similarity to the query embedding
//! (dense), BM25 over tokenized content+summary (lexical), and the unit's
//! precomputed PageRank centrality. Each signal is normalized to `[0, 1]` by
//! its own max before fusion, so no signal dominates just because its raw
//! scale happens to be larger. The fused top-k is then expanded with
//! immediate structural context (parent, direct callers/callees) pulled from
//! the symbol graph, since a bare unit body is rarely enough to act on.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use claudemem_core::{EdgeType, SymbolGraph};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::store::{IndexStore, QueryFilters, ScoredUnit};

/// How heavily each candidate pool is drawn relative to the requested `k`,
/// so fusion has enough of a pool to rerank from.
const CANDIDATE_POOL_MULTIPLIER: usize = 4;
const MIN_CANDIDATE_POOL: usize = 40;

/// Direct callers/callees attached per surviving hit (spec.md §4.9 context expansion).
const MAX_EXPANDED_NEIGHBORS: usize = 5;
/// Characters kept of a neighbor's signature preview.
const SIGNATURE_PREVIEW_LEN: usize = 120;

/// Distinct queries whose embedding is kept around, so a `watch`-style loop
/// or a repeated `search` doesn't re-embed the same query every time.
const QUERY_CACHE_CAPACITY: usize = 128;

/// Forces which signal(s) contribute to the result set, overriding the
/// configured fusion weights (spec.md §4.9 mode override / §6 CLI `-k`/keyword flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    #[default]
    Hybrid,
    DenseOnly,
    LexicalOnly,
    /// Lexical signal only, bypassing the embedding provider entirely (no
    /// embed call, so this stays available even with no embed provider
    /// configured or reachable).
    KeywordOnly,
}

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub dense_weight: f64,
    pub lexical_weight: f64,
    pub pagerank_weight: f64,
    pub top_k: usize,
    /// Whether the fusion weights drift with [`FeedbackEvent`]s (spec.md §4.9).
    pub adaptive: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            dense_weight: 0.5,
            lexical_weight: 0.3,
            pagerank_weight: 0.2,
            top_k: 10,
            adaptive: true,
        }
    }
}

/// A user signal about whether a specific previously-returned result was
/// useful. Drifts the per-project adaptive weight mix toward (or away from)
/// whichever signal dominated that result's fused score (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSignal {
    Helpful,
    NotRelevant,
}

#[derive(Debug, Clone)]
pub struct FeedbackEvent {
    pub unit_id: String,
    pub signal: FeedbackSignal,
}

/// Step size a single feedback event nudges the dominant weight by.
const ADAPTIVE_STEP: f64 = 0.05;
/// Hard caps each weight must stay within after every adjustment (spec.md §4.9).
const WEIGHT_MIN: f64 = 0.1;
const WEIGHT_MAX: f64 = 0.8;

/// A neighboring unit attached to a hit for structural context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextExpansion {
    pub parent_id: Option<String>,
    pub parent_name: Option<String>,
    pub callers: Vec<NeighborPreview>,
    pub callees: Vec<NeighborPreview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborPreview {
    pub unit_id: String,
    pub name: Option<String>,
    pub file_path: String,
    pub signature_preview: Option<String>,
}

/// One ranked, context-expanded retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub unit_id: String,
    pub name: Option<String>,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<String>,
    pub summary: Option<String>,
    pub score: f64,
    pub dense_score: f64,
    pub lexical_score: f64,
    pub pagerank_score: f64,
    pub context: ContextExpansion,
}

/// Hybrid dense+lexical+pagerank retriever over an [`IndexStore`] and
/// [`SymbolGraph`] (spec.md §4.9).
pub struct Retriever {
    store: Arc<IndexStore>,
    embed_provider: Option<Arc<dyn EmbeddingProvider>>,
    config: RetrieverConfig,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
    /// Current adaptive weight mix (dense, lexical, pagerank), seeded from
    /// `config` and drifted by [`record_feedback`](Self::record_feedback).
    /// Shared (not owned) so a caller that rebuilds a `Retriever` per query
    /// (e.g. to override `top_k`) can keep the mix persistent across calls.
    weights: Arc<Mutex<(f64, f64, f64)>>,
    /// Per-unit normalized signal breakdown from the most recent hybrid
    /// search that returned it, so a later feedback event knows which
    /// signal to credit or blame (spec.md §4.9). Shared for the same reason
    /// as `weights`.
    last_components: Arc<Mutex<HashMap<String, (f64, f64, f64)>>>,
}

impl Retriever {
    pub fn new(
        store: Arc<IndexStore>,
        embed_provider: Option<Arc<dyn EmbeddingProvider>>,
        config: RetrieverConfig,
    ) -> Self {
        let weights = (config.dense_weight, config.lexical_weight, config.pagerank_weight);
        Self::with_shared_state(
            store,
            embed_provider,
            config,
            Arc::new(Mutex::new(weights)),
            Arc::new(Mutex::new(HashMap::new())),
        )
    }

    /// Construct a retriever sharing its adaptive-weight state with other
    /// instances over the same project (spec.md §4.9's per-project EMA),
    /// so the mix survives a caller that constructs a fresh `Retriever` per
    /// query (e.g. to override `top_k`) rather than keeping one around.
    pub fn with_shared_state(
        store: Arc<IndexStore>,
        embed_provider: Option<Arc<dyn EmbeddingProvider>>,
        config: RetrieverConfig,
        weights: Arc<Mutex<(f64, f64, f64)>>,
        last_components: Arc<Mutex<HashMap<String, (f64, f64, f64)>>>,
    ) -> Self {
        Self {
            store,
            embed_provider,
            config,
            query_cache: Mutex::new(LruCache::new(NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap())),
            weights,
            last_components,
        }
    }

    /// The weight mix currently in effect for hybrid searches (may have
    /// drifted from `config`'s defaults via [`record_feedback`](Self::record_feedback)).
    pub fn current_weights(&self) -> (f64, f64, f64) {
        *self.weights.lock().unwrap()
    }

    /// Record an explicit feedback event about a previously-returned result,
    /// nudging the adaptive weight mix toward (helpful) or away from
    /// (not relevant) whichever signal dominated that result's fused score,
    /// clamped to `[0.1, 0.8]` per weight and renormalized to sum to one
    /// (spec.md §4.9). A no-op when adaptive weighting is disabled or the
    /// unit was never returned by a hybrid search, since there is then no
    /// signal breakdown to attribute credit to.
    pub fn record_feedback(&self, event: &FeedbackEvent) {
        if !self.config.adaptive {
            return;
        }
        let Some((dense, lexical, pagerank)) =
            self.last_components.lock().unwrap().get(&event.unit_id).copied()
        else {
            return;
        };

        let dominant = [(0, dense), (1, lexical), (2, pagerank)]
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);

        let direction = match event.signal {
            FeedbackSignal::Helpful => 1.0,
            FeedbackSignal::NotRelevant => -1.0,
        };

        let mut weights = self.weights.lock().unwrap();
        let mut w = [weights.0, weights.1, weights.2];
        for (i, wi) in w.iter_mut().enumerate() {
            *wi += if i == dominant { direction * ADAPTIVE_STEP } else { -direction * ADAPTIVE_STEP / 2.0 };
        }
        for wi in w.iter_mut() {
            *wi = wi.clamp(WEIGHT_MIN, WEIGHT_MAX);
        }
        let sum: f64 = w.iter().sum();
        *weights = (w[0] / sum, w[1] / sum, w[2] / sum);
    }

    /// Run a hybrid search. `graph` supplies the context-expansion edges and
    /// may be `None` when the caller only needs bare hits (e.g. a dry run).
    pub async fn search(
        &self,
        query: &str,
        mode: RetrievalMode,
        filters: &QueryFilters,
        graph: Option<&SymbolGraph>,
    ) -> Result<Vec<SearchResult>> {
        let k = self.config.top_k;
        let pool_size = (k * CANDIDATE_POOL_MULTIPLIER).max(MIN_CANDIDATE_POOL);

        let dense_hits = if matches!(mode, RetrievalMode::Hybrid | RetrievalMode::DenseOnly) {
            self.dense_candidates(query, pool_size, filters).await?
        } else {
            Vec::new()
        };

        let lexical_hits = if matches!(
            mode,
            RetrievalMode::Hybrid | RetrievalMode::LexicalOnly | RetrievalMode::KeywordOnly
        ) {
            self.lexical_candidates(query, pool_size, filters)?
        } else {
            Vec::new()
        };

        let dense_norm = normalize_by_max(dense_hits.iter().map(|(id, s)| (id.clone(), *s as f64)));
        let lexical_norm = normalize_by_max(lexical_hits.iter().map(|(id, s)| (id.clone(), *s as f64)));

        let mut candidate_ids: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for (id, _) in dense_hits.iter().chain(lexical_hits.iter()) {
            if seen.insert(id.clone()) {
                candidate_ids.push(id.clone());
            }
        }

        let mut pageranks: HashMap<String, f64> = HashMap::new();
        for id in &candidate_ids {
            if let Some(unit) = self.store.find_by_id(id)? {
                pageranks.insert(id.clone(), unit.pagerank.unwrap_or(0.0));
            }
        }
        let pagerank_norm = normalize_by_max(pageranks.iter().map(|(id, s)| (id.clone(), *s)));

        let (w_dense, w_lexical, w_pagerank) = match mode {
            RetrievalMode::DenseOnly => (1.0, 0.0, 0.0),
            RetrievalMode::LexicalOnly | RetrievalMode::KeywordOnly => (0.0, 1.0, 0.0),
            RetrievalMode::Hybrid => self.current_weights(),
        };

        let mut fused: Vec<(String, f64, f64, f64, f64)> = candidate_ids
            .into_iter()
            .map(|id| {
                let dense = dense_norm.get(&id).copied().unwrap_or(0.0);
                let lexical = lexical_norm.get(&id).copied().unwrap_or(0.0);
                let pagerank = pagerank_norm.get(&id).copied().unwrap_or(0.0);
                let score = w_dense * dense + w_lexical * lexical + w_pagerank * pagerank;
                (id, score, dense, lexical, pagerank)
            })
            .collect();

        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        fused.truncate(k);

        let mut results = Vec::with_capacity(fused.len());
        for (id, score, dense, lexical, pagerank) in fused {
            let Some(unit) = self.store.find_by_id(&id)? else {
                continue;
            };
            if matches!(mode, RetrievalMode::Hybrid) {
                self.last_components
                    .lock()
                    .unwrap()
                    .insert(id.clone(), (dense, lexical, pagerank));
            }
            let context = graph
                .map(|g| self.expand_context(g, &id))
                .unwrap_or_default();
            results.push(SearchResult {
                unit_id: unit.id,
                name: unit.name,
                file_path: unit.file_path,
                start_line: unit.start_line,
                end_line: unit.end_line,
                signature: unit.signature,
                summary: unit.summary,
                score,
                dense_score: dense,
                lexical_score: lexical,
                pagerank_score: pagerank,
                context,
            });
        }

        Ok(results)
    }

    async fn dense_candidates(
        &self,
        query: &str,
        pool_size: usize,
        filters: &QueryFilters,
    ) -> Result<Vec<(String, f32)>> {
        let Some(provider) = &self.embed_provider else {
            return Ok(Vec::new());
        };

        let cached = self.query_cache.lock().unwrap().get(query).cloned();
        let query_vec = match cached {
            Some(v) => v,
            None => {
                let outcome = provider.embed(vec![query.to_string()], None).await?;
                let Some(v) = outcome.vectors.into_iter().next().filter(|v| !v.is_empty()) else {
                    return Ok(Vec::new());
                };
                self.query_cache.lock().unwrap().put(query.to_string(), v.clone());
                v
            }
        };

        let hits: Vec<ScoredUnit> = self.store.knn(&query_vec, pool_size, filters)?;
        Ok(hits.into_iter().map(|h| (h.unit.id, h.score)).collect())
    }

    fn lexical_candidates(
        &self,
        query: &str,
        pool_size: usize,
        filters: &QueryFilters,
    ) -> Result<Vec<(String, f32)>> {
        let hits = self.store.lexical(query, pool_size, filters)?;
        Ok(hits.into_iter().map(|h| (h.unit.id, h.score)).collect())
    }

    /// Pull immediate parent + bounded direct callers/callees for a hit
    /// (spec.md §4.9 context expansion).
    fn expand_context(&self, graph: &SymbolGraph, unit_id: &str) -> ContextExpansion {
        let parent = self
            .store
            .find_by_id(unit_id)
            .ok()
            .flatten()
            .and_then(|u| u.parent_id)
            .and_then(|pid| self.store.find_by_id(&pid).ok().flatten());

        let callers = graph
            .incoming(unit_id, EdgeType::Calls)
            .into_iter()
            .take(MAX_EXPANDED_NEIGHBORS)
            .filter_map(|edge| self.preview(&edge.source))
            .collect();

        let callees = graph
            .outgoing(unit_id, EdgeType::Calls)
            .into_iter()
            .take(MAX_EXPANDED_NEIGHBORS)
            .filter_map(|edge| self.preview(&edge.target))
            .collect();

        ContextExpansion {
            parent_id: parent.as_ref().map(|p| p.id.clone()),
            parent_name: parent.and_then(|p| p.name),
            callers,
            callees,
        }
    }

    fn preview(&self, unit_id: &str) -> Option<NeighborPreview> {
        let unit = self.store.find_by_id(unit_id).ok().flatten()?;
        Some(NeighborPreview {
            unit_id: unit.id,
            name: unit.name,
            file_path: unit.file_path,
            signature_preview: unit.signature.map(|s| truncate(&s, SIGNATURE_PREVIEW_LEN)),
        })
    }
}

fn normalize_by_max(scores: impl Iterator<Item = (String, f64)>) -> HashMap<String, f64> {
    let scores: Vec<(String, f64)> = scores.collect();
    let max = scores.iter().map(|(_, s)| *s).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return scores.into_iter().map(|(id, _)| (id, 0.0)).collect();
    }
    scores.into_iter().map(|(id, s)| (id, s / max)).collect()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max_len.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbedOutcome, ModelSpec, ProgressCallback, ProviderStatus};
    use async_trait::async_trait;
    use claudemem_core::{AstMetadata, CodeUnit, UnitType};

    struct FixedProvider {
        spec: ModelSpec,
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(
            &self,
            texts: Vec<String>,
            _progress: Option<&ProgressCallback>,
        ) -> Result<EmbedOutcome> {
            Ok(EmbedOutcome {
                vectors: texts.iter().map(|_| self.vector.clone()).collect(),
                prompt_tokens: None,
                cost_usd: None,
                skipped: 0,
            })
        }

        async fn check_status(&self) -> Result<ProviderStatus> {
            unreachable!("not exercised in these tests")
        }

        async fn warmup(&self) -> Result<()> {
            Ok(())
        }

        fn embedding_dim(&self) -> usize {
            self.vector.len()
        }

        fn model_spec(&self) -> &ModelSpec {
            &self.spec
        }
    }

    fn unit(
        id: &str,
        name: &str,
        file: &str,
        content: &str,
        embedding: Option<Vec<f32>>,
        pagerank: f64,
    ) -> CodeUnit {
        CodeUnit {
            id: id.to_string(),
            parent_id: None,
            unit_type: UnitType::Function,
            file_path: file.to_string(),
            start_line: 1,
            end_line: 5,
            language: "python".to_string(),
            depth: 1,
            name: Some(name.to_string()),
            signature: Some(format!("def {name}()")),
            content: content.to_string(),
            file_hash: "h".to_string(),
            ast_metadata: AstMetadata::default(),
            summary: None,
            embedding,
            pagerank: Some(pagerank),
        }
    }

    #[tokio::test]
    async fn dense_only_mode_ranks_by_cosine_similarity() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        store
            .upsert(&unit("a", "close", "f.py", "pass", Some(vec![1.0, 0.0]), 0.1))
            .unwrap();
        store
            .upsert(&unit("b", "far", "f.py", "pass", Some(vec![0.0, 1.0]), 0.1))
            .unwrap();

        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FixedProvider {
            spec: ModelSpec::parse("local/jina-code"),
            vector: vec![1.0, 0.0],
        });
        let retriever = Retriever::new(store, Some(provider), RetrieverConfig::default());
        let results = retriever
            .search("query", RetrievalMode::DenseOnly, &QueryFilters::default(), None)
            .await
            .unwrap();

        assert_eq!(results[0].unit_id, "a");
    }

    #[tokio::test]
    async fn keyword_only_mode_never_calls_embed_provider() {
        struct PanicProvider;
        #[async_trait]
        impl EmbeddingProvider for PanicProvider {
            async fn embed(
                &self,
                _texts: Vec<String>,
                _progress: Option<&ProgressCallback>,
            ) -> Result<EmbedOutcome> {
                panic!("embed must not be called in keyword-only mode");
            }
            async fn check_status(&self) -> Result<ProviderStatus> {
                unreachable!()
            }
            async fn warmup(&self) -> Result<()> {
                Ok(())
            }
            fn embedding_dim(&self) -> usize {
                2
            }
            fn model_spec(&self) -> &ModelSpec {
                unreachable!()
            }
        }

        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        store
            .upsert(&unit("a", "retry", "f.py", "fn retry_with_backoff() {}", None, 0.1))
            .unwrap();
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(PanicProvider);
        let retriever = Retriever::new(store, Some(provider), RetrieverConfig::default());
        let results = retriever
            .search(
                "retry backoff",
                RetrievalMode::KeywordOnly,
                &QueryFilters::default(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(results[0].unit_id, "a");
    }

    #[tokio::test]
    async fn hybrid_mode_folds_in_pagerank() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        store
            .upsert(&unit("low", "shared", "f.py", "shared shared", None, 0.0))
            .unwrap();
        store
            .upsert(&unit("high", "shared", "g.py", "shared shared", None, 1.0))
            .unwrap();

        let retriever = Retriever::new(store, None, RetrieverConfig::default());
        let results = retriever
            .search("shared", RetrievalMode::Hybrid, &QueryFilters::default(), None)
            .await
            .unwrap();

        assert_eq!(results[0].unit_id, "high");
    }

    #[tokio::test]
    async fn context_expansion_attaches_parent_and_callers() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        let mut child = unit("child", "helper", "f.py", "fn helper() {}", None, 0.5);
        child.parent_id = Some("parent".to_string());
        store
            .upsert(&unit("parent", "Outer", "f.py", "class Outer {}", None, 0.0))
            .unwrap();
        store.upsert(&child).unwrap();
        store
            .upsert(&unit("caller", "caller", "f.py", "fn caller() { helper() }", None, 0.0))
            .unwrap();

        let units = store.iter_all().unwrap();
        let mut graph = SymbolGraph::build(&units);
        graph.add_edge("caller", "child", EdgeType::Calls);

        let retriever = Retriever::new(store, None, RetrieverConfig::default());
        let results = retriever
            .search(
                "helper",
                RetrievalMode::LexicalOnly,
                &QueryFilters::default(),
                Some(&graph),
            )
            .await
            .unwrap();

        let hit = results.iter().find(|r| r.unit_id == "child").unwrap();
        assert_eq!(hit.context.parent_id.as_deref(), Some("parent"));
        assert_eq!(hit.context.callers.len(), 1);
        assert_eq!(hit.context.callers[0].unit_id, "caller");
    }

    #[tokio::test]
    async fn helpful_feedback_nudges_dominant_weight_up() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        store
            .upsert(&unit("a", "close", "f.py", "pass", Some(vec![1.0, 0.0]), 0.0))
            .unwrap();

        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FixedProvider {
            spec: ModelSpec::parse("local/jina-code"),
            vector: vec![1.0, 0.0],
        });
        let retriever = Retriever::new(store, Some(provider), RetrieverConfig::default());
        retriever
            .search("query", RetrievalMode::Hybrid, &QueryFilters::default(), None)
            .await
            .unwrap();

        let before = retriever.current_weights();
        retriever.record_feedback(&FeedbackEvent {
            unit_id: "a".to_string(),
            signal: FeedbackSignal::Helpful,
        });
        let after = retriever.current_weights();

        // "a" only scores on the dense signal (no lexical match, zero
        // pagerank), so helpful feedback should raise the dense weight and
        // lower the others, while the mix still sums to one.
        assert!(after.0 > before.0);
        assert!(after.1 <= before.1);
        assert!(after.2 <= before.2);
        assert!((after.0 + after.1 + after.2 - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn feedback_for_unreturned_unit_is_a_no_op() {
        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        store
            .upsert(&unit("a", "close", "f.py", "pass", Some(vec![1.0, 0.0]), 0.0))
            .unwrap();
        let retriever = Retriever::new(store, None, RetrieverConfig::default());

        let before = retriever.current_weights();
        retriever.record_feedback(&FeedbackEvent {
            unit_id: "never-seen".to_string(),
            signal: FeedbackSignal::Helpful,
        });
        assert_eq!(retriever.current_weights(), before);
    }

    #[tokio::test]
    async fn repeated_query_reuses_cached_embedding() {
        struct CountingProvider {
            spec: ModelSpec,
            calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl EmbeddingProvider for CountingProvider {
            async fn embed(
                &self,
                texts: Vec<String>,
                _progress: Option<&ProgressCallback>,
            ) -> Result<EmbedOutcome> {
                self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(EmbedOutcome {
                    vectors: texts.iter().map(|_| vec![1.0, 0.0]).collect(),
                    prompt_tokens: None,
                    cost_usd: None,
                    skipped: 0,
                })
            }
            async fn check_status(&self) -> Result<ProviderStatus> {
                unreachable!()
            }
            async fn warmup(&self) -> Result<()> {
                Ok(())
            }
            fn embedding_dim(&self) -> usize {
                2
            }
            fn model_spec(&self) -> &ModelSpec {
                &self.spec
            }
        }

        let store = Arc::new(IndexStore::open_in_memory().unwrap());
        store
            .upsert(&unit("a", "close", "f.py", "pass", Some(vec![1.0, 0.0]), 0.1))
            .unwrap();
        let provider = Arc::new(CountingProvider {
            spec: ModelSpec::parse("local/jina-code"),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let retriever = Retriever::new(store, Some(provider.clone()), RetrieverConfig::default());

        for _ in 0..3 {
            retriever
                .search("same query", RetrievalMode::DenseOnly, &QueryFilters::default(), None)
                .await
                .unwrap();
        }

        assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
