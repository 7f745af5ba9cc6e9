//! Remote chat provider: Claude (`cc`/`a`), OpenRouter (`or`), Ollama, and
//! LM Studio (spec.md §4.1).
//!
//! One request per [`ChatProvider::chat`] call (chat has no batching
//! concept); the retry/backoff/fail-fast policy mirrors
//! `claudemem_search::embeddings::RemoteProvider` exactly — up to 3
//! attempts, base-1s exponential backoff, 401/403 never retried.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::chat_spec::{price_per_million, ChatModelSpec};
use super::{ChatOptions, ChatOutcome, ChatProvider, Result};
use crate::error::BackendError;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointStyle {
    /// Anthropic Messages API: `system` field, `messages: [{role, content}]`.
    Anthropic,
    /// OpenAI-compatible chat completions: system+user both in `messages`.
    OpenAiCompatible,
    /// Ollama `/api/chat`: OpenAI-shaped messages, no auth, no streaming.
    Ollama,
}

struct Endpoint {
    url: String,
    style: EndpointStyle,
    api_key: Option<String>,
}

fn resolve_endpoint(spec: &ChatModelSpec) -> Result<Endpoint> {
    match spec.namespace.as_str() {
        "cc" | "a" => Ok(Endpoint {
            url: env::var("CLAUDEMEM_ANTHROPIC_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
            style: EndpointStyle::Anthropic,
            api_key: env::var("ANTHROPIC_API_KEY").ok(),
        }),
        "or" => Ok(Endpoint {
            url: env::var("CLAUDEMEM_OPENROUTER_CHAT_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1/chat/completions".to_string()),
            style: EndpointStyle::OpenAiCompatible,
            api_key: env::var("OPENROUTER_API_KEY").ok(),
        }),
        "ollama" => Ok(Endpoint {
            url: env::var("CLAUDEMEM_OLLAMA_CHAT_URL")
                .unwrap_or_else(|_| "http://localhost:11434/api/chat".to_string()),
            style: EndpointStyle::Ollama,
            api_key: None,
        }),
        "lmstudio" => Ok(Endpoint {
            url: env::var("CLAUDEMEM_LMSTUDIO_CHAT_URL")
                .unwrap_or_else(|_| "http://localhost:1234/v1/chat/completions".to_string()),
            style: EndpointStyle::OpenAiCompatible,
            api_key: None,
        }),
        other => Err(BackendError::configuration(format!(
            "unknown chat namespace: {other}"
        ))),
    }
}

fn requires_auth(spec: &ChatModelSpec) -> bool {
    matches!(spec.namespace.as_str(), "cc" | "a" | "or")
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

#[derive(Debug, Serialize)]
struct OllamaChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessageOwned,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessageOwned {
    #[serde(default)]
    content: String,
}

pub struct RemoteChatProvider {
    client: reqwest::Client,
    endpoint: Endpoint,
    spec: ChatModelSpec,
}

impl RemoteChatProvider {
    pub fn new(spec: ChatModelSpec) -> Result<Self> {
        let endpoint = resolve_endpoint(&spec)?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            endpoint,
            spec,
        })
    }

    async fn send_once(&self, system: &str, user: &str, options: &ChatOptions) -> Result<ChatOutcome> {
        match self.endpoint.style {
            EndpointStyle::Anthropic => self.send_anthropic(system, user, options).await,
            EndpointStyle::OpenAiCompatible => self.send_openai_compatible(system, user, options).await,
            EndpointStyle::Ollama => self.send_ollama(system, user, options).await,
        }
    }

    async fn send_anthropic(&self, system: &str, user: &str, options: &ChatOptions) -> Result<ChatOutcome> {
        let Some(api_key) = &self.endpoint.api_key else {
            return Err(BackendError::Authentication(format!(
                "no API key configured for {}",
                self.spec.namespace
            )));
        };

        let body = json!({
            "model": self.spec.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        let response = self
            .client
            .post(&self.endpoint.url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;
        classify_status(response.status())?;

        let parsed: AnthropicResponse = response.json().await?;
        let text = parsed.content.into_iter().map(|b| b.text).collect::<String>();
        let (prompt_tokens, completion_tokens) = parsed
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((None, None));

        Ok(ChatOutcome {
            text,
            prompt_tokens,
            completion_tokens,
            cost_usd: cost(&self.spec, prompt_tokens, completion_tokens),
        })
    }

    async fn send_openai_compatible(
        &self,
        system: &str,
        user: &str,
        options: &ChatOptions,
    ) -> Result<ChatOutcome> {
        if requires_auth(&self.spec) && self.endpoint.api_key.is_none() {
            return Err(BackendError::Authentication(format!(
                "no API key configured for {}",
                self.spec.namespace
            )));
        }

        let body = json!({
            "model": self.spec.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let mut request = self.client.post(&self.endpoint.url).json(&body);
        if let Some(key) = &self.endpoint.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        classify_status(response.status())?;

        let parsed: OpenAiChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let (prompt_tokens, completion_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((None, None));

        Ok(ChatOutcome {
            text,
            prompt_tokens,
            completion_tokens,
            cost_usd: cost(&self.spec, prompt_tokens, completion_tokens),
        })
    }

    async fn send_ollama(&self, system: &str, user: &str, _options: &ChatOptions) -> Result<ChatOutcome> {
        let body = json!({
            "model": self.spec.model,
            "stream": false,
            "messages": [
                OllamaChatMessage { role: "system", content: system },
                OllamaChatMessage { role: "user", content: user },
            ],
        });

        let response = self.client.post(&self.endpoint.url).json(&body).send().await?;
        classify_status(response.status())?;
        let parsed: OllamaChatResponse = response.json().await?;

        Ok(ChatOutcome {
            text: parsed.message.content,
            prompt_tokens: None,
            completion_tokens: None,
            cost_usd: Some(0.0),
        })
    }
}

fn cost(spec: &ChatModelSpec, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) -> Option<f64> {
    let (prompt_price, completion_price) = price_per_million(spec);
    let prompt_cost = prompt_tokens.map(|t| (t as f64 / 1_000_000.0) * prompt_price);
    let completion_cost = completion_tokens.map(|t| (t as f64 / 1_000_000.0) * completion_price);
    match (prompt_cost, completion_cost) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

fn classify_status(status: reqwest::StatusCode) -> Result<()> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(BackendError::Authentication(format!("http {status}")));
    }
    if !status.is_success() {
        return Err(BackendError::Transient(format!("http {status}")));
    }
    Ok(())
}

#[async_trait]
impl ChatProvider for RemoteChatProvider {
    async fn chat(&self, system_prompt: &str, user_prompt: &str, options: &ChatOptions) -> Result<ChatOutcome> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(system_prompt, user_prompt, options).await {
                Ok(outcome) => return Ok(outcome),
                Err(BackendError::Authentication(msg)) => {
                    warn!("chat authentication failure, not retrying: {msg}");
                    return Err(BackendError::Authentication(msg));
                }
                Err(e) if attempt >= MAX_ATTEMPTS => {
                    warn!("chat call failed after {attempt} attempts: {e}");
                    return Err(BackendError::Transient(e.to_string()));
                }
                Err(e) => {
                    let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    debug!("chat attempt {attempt} failed ({e}), retrying in {backoff:?}");
                    sleep(backoff).await;
                }
            }
        }
    }

    fn model_spec(&self) -> &ChatModelSpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_namespaces() {
        assert!(resolve_endpoint(&ChatModelSpec::parse("ollama/llama3.2")).is_ok());
        assert!(resolve_endpoint(&ChatModelSpec::parse("cc/sonnet")).is_ok());
    }

    #[test]
    fn unknown_namespace_is_configuration_error() {
        let spec = ChatModelSpec {
            raw: "bogus/foo".to_string(),
            namespace: "bogus".to_string(),
            model: "foo".to_string(),
        };
        assert!(matches!(
            resolve_endpoint(&spec),
            Err(BackendError::Configuration(_))
        ));
    }

    #[test]
    fn classify_status_flags_auth_failures() {
        assert!(matches!(
            classify_status(reqwest::StatusCode::UNAUTHORIZED),
            Err(BackendError::Authentication(_))
        ));
        assert!(classify_status(reqwest::StatusCode::OK).is_ok());
    }

    #[test]
    fn cost_falls_back_to_zero_side_when_one_count_missing() {
        let spec = ChatModelSpec::parse("cc/sonnet");
        let c = cost(&spec, Some(1_000_000), None).unwrap();
        assert!((c - 3.0).abs() < 1e-9);
    }
}
