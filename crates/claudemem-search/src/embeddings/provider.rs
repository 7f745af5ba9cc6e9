//! Embed-contract provider trait and the `namespace/model` spec parser
//! (spec.md §4.1).
//!
//! A single [`EmbeddingProvider`] trait covers both the local Candle-backed
//! provider and any remote HTTP-based one; callers never know which they
//! are talking to beyond the `namespace/model` string that selected it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A parsed `namespace/model` identifier (spec.md §4.1).
///
/// Bare names with no `/` (e.g. `voyage-code-3`) are treated as Voyage AI
/// model ids, since that is the one embed provider in the supported set
/// that is conventionally referenced without a namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub raw: String,
    pub namespace: String,
    pub model: String,
}

impl ModelSpec {
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('/') {
            Some((namespace, model)) if is_known_namespace(namespace) => ModelSpec {
                raw: spec.to_string(),
                namespace: namespace.to_string(),
                model: model.to_string(),
            },
            _ => ModelSpec {
                raw: spec.to_string(),
                namespace: "voyage".to_string(),
                model: spec.to_string(),
            },
        }
    }

    pub fn is_local(&self) -> bool {
        self.namespace == "local"
    }
}

fn is_known_namespace(namespace: &str) -> bool {
    matches!(
        namespace,
        "local" | "openrouter" | "voyage" | "ollama" | "lmstudio" | "azure-ml" | "openai"
    )
}

/// Known context-length ceilings, in tokens, keyed by the full `namespace/model`
/// string; anything absent falls back to [`DEFAULT_CONTEXT_LENGTH`].
fn context_length_for(spec: &ModelSpec) -> usize {
    match spec.raw.as_str() {
        "local/jina-code" | "local/jina-text" => 8192,
        "voyage-code-3" => 16000,
        "ollama/nomic-embed-text" => 2048,
        _ if spec.namespace == "openrouter" => 32000,
        _ => DEFAULT_CONTEXT_LENGTH,
    }
}

const DEFAULT_CONTEXT_LENGTH: usize = 8192;
/// Rough characters-per-token ratio used to turn a token budget into a
/// character budget without running the model's own tokenizer twice.
const CHARS_PER_TOKEN: usize = 2;

/// Truncate `text` to the model's context budget, head-first (the
/// beginning of the text is kept, the tail is dropped), marking the cut
/// with an ellipsis (spec.md §4.1).
pub fn truncate_to_budget(text: &str, spec: &ModelSpec) -> String {
    let max_chars = context_length_for(spec) * CHARS_PER_TOKEN;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// Per-model USD price per million tokens, used when a provider does not
/// return an explicit cost in its usage record (spec.md §4.1).
pub fn price_per_million(spec: &ModelSpec) -> f64 {
    match spec.raw.as_str() {
        "voyage-code-3" => 0.18,
        "openrouter/qwen3-embedding-8b" => 0.05,
        _ if spec.is_local() => 0.0,
        _ => DEFAULT_PRICE_PER_MILLION,
    }
}

const DEFAULT_PRICE_PER_MILLION: f64 = 0.10;

/// Invoked with `(completed, total)` as batches finish.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Result of one [`EmbeddingProvider::embed`] call.
///
/// `vectors[i]` is empty when text `i` belonged to a batch that failed and
/// was isolated rather than failing the whole call (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct EmbedOutcome {
    pub vectors: Vec<Vec<f32>>,
    pub prompt_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub skipped: usize,
}

/// Device/endpoint and readiness for diagnostics (`claudemem doctor`, status queries).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub available: bool,
    pub model: String,
    pub device: String,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl ProviderStatus {
    pub fn healthy(model: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            available: true,
            model: model.into(),
            device: device.into(),
            latency_ms: None,
            error: None,
        }
    }

    pub fn unavailable(model: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            available: false,
            model: model.into(),
            device: "n/a".into(),
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// The embed side of the uniform provider capability (spec.md §4.1).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `texts`, in input order. Implementations batch, retry, and
    /// isolate per-batch failures internally; callers always get back a
    /// vector the same length as `texts`.
    async fn embed(&self, texts: Vec<String>, progress: Option<&ProgressCallback>) -> Result<EmbedOutcome>;

    async fn check_status(&self) -> Result<ProviderStatus>;

    /// Preload models / warm up connections.
    async fn warmup(&self) -> Result<()>;

    fn embedding_dim(&self) -> usize;

    fn model_spec(&self) -> &ModelSpec;
}

/// Usage/cost record a remote provider may return alongside its vectors.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct UsageRecord {
    pub prompt_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
}
