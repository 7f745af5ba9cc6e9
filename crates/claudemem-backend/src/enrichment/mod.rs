//! Enrichment pipeline: LLM-generated natural-language summaries per code
//! unit, optionally sharpened by iterative refinement against a
//! [`quality::QualityStrategy`] (spec.md §4.4).

pub mod quality;
pub mod refinement;

use std::sync::Arc;

use claudemem_core::CodeUnit;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::providers::{ChatOptions, ChatProvider};
use quality::{QualityContext, QualityStrategy};
use refinement::{ProgressCallback, RefinementEngine};

pub type Result<T> = std::result::Result<T, BackendError>;

const SYSTEM_PROMPT: &str = "You write short, intent-focused summaries of code units for a \
     semantic search index. Describe what the code does and why it matters, not how it is \
     implemented line by line. One or two sentences. Respond with the summary only, no preamble.";

/// Outcome of enriching one unit.
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub summary: String,
    pub refined: bool,
    /// Quality score of the returned summary, when a quality strategy ran.
    pub score: Option<f64>,
    pub rounds: u32,
}

/// Generates an initial summary via [`ChatProvider::chat`] and, when a
/// quality strategy is configured, drives it through [`RefinementEngine`].
pub struct EnrichmentPipeline {
    chat: Arc<dyn ChatProvider>,
    quality: Option<Arc<dyn QualityStrategy>>,
    max_rounds: u32,
}

impl EnrichmentPipeline {
    pub fn new(chat: Arc<dyn ChatProvider>, quality: Option<Arc<dyn QualityStrategy>>, max_rounds: u32) -> Self {
        Self {
            chat,
            quality,
            max_rounds,
        }
    }

    /// Without refinement enabled (no quality strategy), one chat call
    /// produces the summary used as-is. With refinement enabled, the initial
    /// summary is round 0 of [`RefinementEngine::run`].
    pub async fn enrich(
        &self,
        context: &QualityContext<'_>,
        cancellation: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<EnrichmentOutcome> {
        if cancellation.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        let initial = self.generate_initial(context.unit).await?;

        let Some(quality) = &self.quality else {
            return Ok(EnrichmentOutcome {
                summary: initial,
                refined: false,
                score: None,
                rounds: 0,
            });
        };

        let engine = RefinementEngine::new(self.max_rounds, quality.clone(), self.chat.clone());
        let outcome = engine.run(initial, context, cancellation, progress).await?;

        Ok(EnrichmentOutcome {
            summary: outcome.summary,
            refined: true,
            score: Some(outcome.score),
            rounds: outcome.attempts.len() as u32,
        })
    }

    async fn generate_initial(&self, unit: &CodeUnit) -> Result<String> {
        let name = unit.name.as_deref().unwrap_or(unit.file_path.as_str());
        let user = format!(
            "Unit: {name} ({})\nFile: {}\n\nCode:\n```{}\n{}\n```\n\nWrite the summary.",
            unit.unit_type.as_str(),
            unit.file_path,
            unit.language,
            unit.content
        );
        let outcome = self.chat.chat(SYSTEM_PROMPT, &user, &ChatOptions::default()).await?;
        Ok(outcome.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use claudemem_core::{AstMetadata, UnitType};
    use quality::QualityResult;

    fn unit() -> CodeUnit {
        CodeUnit {
            id: "u1".to_string(),
            parent_id: None,
            unit_type: UnitType::Function,
            file_path: "f.py".to_string(),
            start_line: 1,
            end_line: 2,
            language: "python".to_string(),
            depth: 1,
            name: Some("validate".to_string()),
            signature: None,
            content: "def validate(): pass".to_string(),
            file_hash: "h".to_string(),
            ast_metadata: AstMetadata::default(),
            summary: None,
            embedding: None,
            pagerank: None,
        }
    }

    struct EchoChatProvider(&'static str);

    #[async_trait]
    impl ChatProvider for EchoChatProvider {
        async fn chat(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _options: &ChatOptions,
        ) -> Result<crate::providers::ChatOutcome> {
            Ok(crate::providers::ChatOutcome {
                text: self.0.to_string(),
                prompt_tokens: None,
                completion_tokens: None,
                cost_usd: None,
            })
        }

        fn model_spec(&self) -> &crate::providers::ChatModelSpec {
            unreachable!("not exercised in these tests")
        }
    }

    #[tokio::test]
    async fn without_quality_strategy_returns_unrefined_summary() {
        let pipeline = EnrichmentPipeline::new(Arc::new(EchoChatProvider("validates a token")), None, 3);
        let u = unit();
        let context = QualityContext {
            unit: &u,
            reference_queries: &[],
            candidate_pool: &[],
        };
        let outcome = pipeline
            .enrich(&context, &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(!outcome.refined);
        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.summary, "validates a token");
    }

    #[tokio::test]
    async fn with_quality_strategy_drives_refinement() {
        struct AlwaysPass;
        #[async_trait]
        impl QualityStrategy for AlwaysPass {
            async fn test_quality(&self, _summary: &str, _context: &QualityContext<'_>) -> Result<QualityResult> {
                Ok(QualityResult {
                    passed: true,
                    rank: Some(1),
                    score: 1.0,
                    details: String::new(),
                })
            }
            fn generate_feedback(&self, _result: &QualityResult, _context: &QualityContext<'_>) -> String {
                String::new()
            }
            fn name(&self) -> &str {
                "always-pass"
            }
        }

        let pipeline = EnrichmentPipeline::new(
            Arc::new(EchoChatProvider("validates a token")),
            Some(Arc::new(AlwaysPass)),
            3,
        );
        let u = unit();
        let context = QualityContext {
            unit: &u,
            reference_queries: &[],
            candidate_pool: &[],
        };
        let outcome = pipeline
            .enrich(&context, &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(outcome.refined);
        assert_eq!(outcome.rounds, 1);
        assert!((outcome.score.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_any_chat_call() {
        struct PanicChatProvider;
        #[async_trait]
        impl ChatProvider for PanicChatProvider {
            async fn chat(
                &self,
                _system_prompt: &str,
                _user_prompt: &str,
                _options: &ChatOptions,
            ) -> Result<crate::providers::ChatOutcome> {
                panic!("chat must not be called once cancelled");
            }
            fn model_spec(&self) -> &crate::providers::ChatModelSpec {
                unreachable!()
            }
        }

        let pipeline = EnrichmentPipeline::new(Arc::new(PanicChatProvider), None, 3);
        let u = unit();
        let context = QualityContext {
            unit: &u,
            reference_queries: &[],
            candidate_pool: &[],
        };
        let token = CancellationToken::new();
        token.cancel();
        let result = pipeline.enrich(&context, &token, None).await;
        assert!(matches!(result, Err(BackendError::Cancelled)));
    }
}
