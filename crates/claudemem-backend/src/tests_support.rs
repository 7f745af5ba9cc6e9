//! Test-only fixtures shared across `enrichment`/`providers` unit tests.

use async_trait::async_trait;
use claudemem_search::embeddings::{
    EmbedOutcome, EmbeddingProvider, ModelSpec, ProgressCallback, ProviderStatus,
};
use claudemem_search::Result;

/// Deterministic stand-in embed provider: each text's vector has one
/// dimension per configured keyword, set to 1.0 when the text contains that
/// keyword and 0.0 otherwise, so cosine similarity is exactly keyword
/// overlap. With no keywords configured, every text embeds to `[1.0]`.
pub struct FixedEmbeddingProvider {
    keywords: Vec<String>,
    spec: ModelSpec,
}

impl FixedEmbeddingProvider {
    pub fn identity() -> Self {
        Self {
            keywords: Vec::new(),
            spec: ModelSpec::parse("local/jina-code"),
        }
    }

    pub fn keyword_match(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            spec: ModelSpec::parse("local/jina-code"),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        if self.keywords.is_empty() {
            return vec![1.0];
        }
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| if lower.contains(&k.to_lowercase()) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbeddingProvider {
    async fn embed(&self, texts: Vec<String>, _progress: Option<&ProgressCallback>) -> Result<EmbedOutcome> {
        Ok(EmbedOutcome {
            vectors: texts.iter().map(|t| self.embed_one(t)).collect(),
            prompt_tokens: None,
            cost_usd: None,
            skipped: 0,
        })
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        Ok(ProviderStatus::healthy(self.spec.raw.clone(), "test"))
    }

    async fn warmup(&self) -> Result<()> {
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        self.keywords.len().max(1)
    }

    fn model_spec(&self) -> &ModelSpec {
        &self.spec
    }
}
