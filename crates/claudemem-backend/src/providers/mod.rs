//! Chat half of the Provider Adapters capability (spec.md §4.1).
//!
//! Mirrors `claudemem_search::embeddings`: a single [`ChatProvider`] trait
//! covers every backend, and [`create`] auto-detects which one from the
//! `prefix/name` model spec string. The embed side lives in
//! `claudemem_search::embeddings`; this module owns only `chat`.

mod chat_spec;
mod remote;

pub use chat_spec::{price_per_million, ChatModelSpec};
pub use remote::RemoteChatProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub type Result<T> = std::result::Result<T, BackendError>;

/// Generation knobs for a [`ChatProvider::chat`] call (spec.md §4.1 chat contract).
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

/// Result of one [`ChatProvider::chat`] call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub text: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
}

/// The chat side of the uniform provider capability (spec.md §4.1).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Complete one system+user prompt pair. A single call; on cancellation
    /// or timeout, partial results are discarded (spec.md §5 suspension points).
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ChatOptions,
    ) -> Result<ChatOutcome>;

    fn model_spec(&self) -> &ChatModelSpec;
}

/// Create the chat provider implied by `spec` (e.g. `cc/sonnet`, `a/opus`,
/// `or/openai/gpt-4o`, `ollama/llama3.2`, `lmstudio/<model>`).
pub fn create(spec: &str) -> Result<Arc<dyn ChatProvider>> {
    let model_spec = ChatModelSpec::parse(spec);
    Ok(Arc::new(RemoteChatProvider::new(model_spec)?))
}
