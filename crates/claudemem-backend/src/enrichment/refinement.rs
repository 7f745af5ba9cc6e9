//! Iterative refinement engine (spec.md §4.4).
//!
//! Round 0 tests the initial summary as-is. Each subsequent round shows the
//! model the code, its previous summary, and the strategy's feedback, and
//! asks for a revision. The engine stops on success, on reaching
//! `max_rounds`, or on cancellation; it always retains the best-ranked
//! summary seen so far (refinement monotonicity, spec.md §8), even if a
//! later round's summary happened to score worse.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::quality::{QualityContext, QualityResult, QualityStrategy};
use crate::error::BackendError;
use crate::providers::{ChatOptions, ChatProvider};

pub type Result<T> = std::result::Result<T, BackendError>;

/// One round's attempt, kept for observability/debugging.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub round: u32,
    pub summary: String,
    pub test_result: QualityResult,
    pub feedback: String,
    pub duration: Duration,
}

/// Outcome of a full refinement run.
#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub summary: String,
    pub success: bool,
    pub attempts: Vec<Attempt>,
    /// `1 / log2(rounds + 2)`; round 0 success scores 1.0 (spec.md §4.4).
    pub score: f64,
}

/// Invoked with `(round, max_rounds)` as each round starts.
pub type ProgressCallback = Box<dyn Fn(u32, u32) + Send + Sync>;

pub struct RefinementEngine {
    max_rounds: u32,
    strategy: Arc<dyn QualityStrategy>,
    chat: Arc<dyn ChatProvider>,
}

impl RefinementEngine {
    pub fn new(max_rounds: u32, strategy: Arc<dyn QualityStrategy>, chat: Arc<dyn ChatProvider>) -> Self {
        Self {
            max_rounds,
            strategy,
            chat,
        }
    }

    pub async fn run(
        &self,
        initial_summary: String,
        context: &QualityContext<'_>,
        cancellation: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<RefinementOutcome> {
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut current_summary = initial_summary;
        let mut best_idx: Option<usize> = None;
        let mut success_round: Option<u32> = None;
        let mut last_round_reached = 0u32;

        for round in 0..=self.max_rounds {
            if cancellation.is_cancelled() {
                debug!("refinement cancelled at round {round}");
                break;
            }
            if let Some(cb) = progress {
                cb(round, self.max_rounds);
            }

            let started = Instant::now();
            let test_result = self.strategy.test_quality(&current_summary, context).await?;
            let duration = started.elapsed();
            let succeeded = self.strategy.is_success(&test_result);

            let feedback = if succeeded || round == self.max_rounds {
                String::new()
            } else {
                self.strategy.generate_feedback(&test_result, context)
            };

            attempts.push(Attempt {
                round,
                summary: current_summary.clone(),
                test_result: test_result.clone(),
                feedback: feedback.clone(),
                duration,
            });
            last_round_reached = round;

            let is_better = best_idx
                .map(|i| test_result.score > attempts[i].test_result.score)
                .unwrap_or(true);
            if is_better {
                best_idx = Some(attempts.len() - 1);
            }

            if succeeded {
                success_round = Some(round);
                break;
            }
            if round == self.max_rounds {
                break;
            }

            current_summary = self
                .revise(&current_summary, &feedback, context)
                .await
                .unwrap_or(current_summary);
        }

        let best = best_idx.map(|i| attempts[i].clone());
        let final_round = success_round.unwrap_or(last_round_reached);
        let score = 1.0 / (final_round as f64 + 2.0).log2();

        Ok(RefinementOutcome {
            summary: best.as_ref().map(|a| a.summary.clone()).unwrap_or_default(),
            success: success_round.is_some(),
            attempts,
            score,
        })
    }

    async fn revise(&self, previous_summary: &str, feedback: &str, context: &QualityContext<'_>) -> Result<String> {
        let system = "You write short, intent-focused summaries of code units for a semantic \
                       search index. Describe what the code does, not how it is implemented. \
                       Respond with the summary only, no preamble.";
        let user = format!(
            "Code:\n```{}\n{}\n```\n\nPrevious summary: {previous_summary}\n\nFeedback: {feedback}\n\n\
             Write a revised summary.",
            context.unit.language, context.unit.content
        );
        let outcome = self.chat.chat(system, &user, &ChatOptions::default()).await?;
        Ok(outcome.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::quality::{QualityContext, QualityResult, QualityStrategy};
    use async_trait::async_trait;
    use claudemem_core::{AstMetadata, CodeUnit, UnitType};

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

    /// Succeeds once the summary contains "precise".
    struct ContainsWordStrategy;

    #[async_trait]
    impl QualityStrategy for ContainsWordStrategy {
        async fn test_quality(&self, summary: &str, _context: &QualityContext<'_>) -> Result<QualityResult> {
            let passed = summary.contains("precise");
            Ok(QualityResult {
                passed,
                rank: None,
                score: if passed { 1.0 } else { 0.2 },
                details: String::new(),
            })
        }

        fn generate_feedback(&self, _result: &QualityResult, _context: &QualityContext<'_>) -> String {
            "be more precise".to_string()
        }

        fn name(&self) -> &str {
            "contains-word"
        }
    }

    struct EchoChatProvider;

    #[async_trait]
    impl ChatProvider for EchoChatProvider {
        async fn chat(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _options: &ChatOptions,
        ) -> Result<crate::providers::ChatOutcome> {
            Ok(crate::providers::ChatOutcome {
                text: "a precise summary".to_string(),
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
    async fn round_zero_success_scores_one() {
        let engine = RefinementEngine::new(3, Arc::new(ContainsWordStrategy), Arc::new(EchoChatProvider));
        let u = unit();
        let context = QualityContext {
            unit: &u,
            reference_queries: &[],
            candidate_pool: &[],
        };
        let outcome = engine
            .run(
                "a precise summary".to_string(),
                &context,
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.attempts.len(), 1);
        assert!((outcome.score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn refines_across_rounds_until_success() {
        let engine = RefinementEngine::new(3, Arc::new(ContainsWordStrategy), Arc::new(EchoChatProvider));
        let u = unit();
        let context = QualityContext {
            unit: &u,
            reference_queries: &[],
            candidate_pool: &[],
        };
        let outcome = engine
            .run("a vague summary".to_string(), &context, &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.summary.contains("precise"));
    }

    #[tokio::test]
    async fn cancellation_returns_best_seen_with_failure() {
        let engine = RefinementEngine::new(3, Arc::new(ContainsWordStrategy), Arc::new(EchoChatProvider));
        let u = unit();
        let context = QualityContext {
            unit: &u,
            reference_queries: &[],
            candidate_pool: &[],
        };
        let token = CancellationToken::new();
        token.cancel();
        let outcome = engine
            .run("a vague summary".to_string(), &context, &token, None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn max_rounds_without_success_scores_via_rounds_formula() {
        struct NeverPass;
        #[async_trait]
        impl QualityStrategy for NeverPass {
            async fn test_quality(&self, _summary: &str, _context: &QualityContext<'_>) -> Result<QualityResult> {
                Ok(QualityResult {
                    passed: false,
                    rank: None,
                    score: 0.1,
                    details: String::new(),
                })
            }
            fn generate_feedback(&self, _result: &QualityResult, _context: &QualityContext<'_>) -> String {
                "keep trying".to_string()
            }
            fn name(&self) -> &str {
                "never-pass"
            }
        }

        let engine = RefinementEngine::new(3, Arc::new(NeverPass), Arc::new(EchoChatProvider));
        let u = unit();
        let context = QualityContext {
            unit: &u,
            reference_queries: &[],
            candidate_pool: &[],
        };
        let outcome = engine
            .run("a summary".to_string(), &context, &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.attempts.len(), 4); // rounds 0..=3
        let expected = 1.0 / (3.0_f64 + 2.0).log2();
        assert!((outcome.score - expected).abs() < 1e-9);
    }
}
