//! Remote embed provider: OpenRouter, Voyage AI, Ollama, and LM Studio
//! (spec.md §4.1).
//!
//! All four speak (or nearly speak) the OpenAI `/v1/embeddings` shape —
//! `{"model": ..., "input": [...]}` in, `{"data": [{"embedding": [...]}]}`
//! out — except Ollama, whose `/api/embeddings` endpoint accepts one prompt
//! per call. `RemoteProvider` dispatches between the two request shapes by
//! namespace and otherwise shares one batching/retry/cost pipeline.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::provider::{
    price_per_million, truncate_to_budget, EmbedOutcome, EmbeddingProvider, ModelSpec,
    ProgressCallback, ProviderStatus, UsageRecord,
};
use crate::error::{Result, SearchError};

const DEFAULT_BATCH_SIZE: usize = 20;
const DEFAULT_PARALLELISM: usize = 5;
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Endpoint shape a namespace talks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointStyle {
    /// OpenAI-compatible: batched `input` array, bearer auth.
    OpenAiCompatible,
    /// Ollama: one prompt per request, no auth.
    Ollama,
}

#[derive(Debug, Clone)]
struct Endpoint {
    url: String,
    style: EndpointStyle,
    api_key: Option<String>,
}

/// Resolve the endpoint shape/URL for a namespace. Does not require the
/// provider's API key to be present yet — that's checked fail-fast at the
/// first actual request, so a provider can be constructed (e.g. to inspect
/// its model spec) before credentials are available.
fn resolve_endpoint(spec: &ModelSpec) -> Result<Endpoint> {
    match spec.namespace.as_str() {
        "openrouter" => Ok(Endpoint {
            url: env::var("CLAUDEMEM_OPENROUTER_EMBED_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1/embeddings".to_string()),
            style: EndpointStyle::OpenAiCompatible,
            api_key: env::var("OPENROUTER_API_KEY").ok(),
        }),
        "voyage" => Ok(Endpoint {
            url: env::var("CLAUDEMEM_VOYAGE_EMBED_URL")
                .unwrap_or_else(|_| "https://api.voyageai.com/v1/embeddings".to_string()),
            style: EndpointStyle::OpenAiCompatible,
            api_key: env::var("VOYAGE_API_KEY").ok(),
        }),
        "ollama" => Ok(Endpoint {
            url: env::var("CLAUDEMEM_OLLAMA_EMBED_URL")
                .unwrap_or_else(|_| "http://localhost:11434/api/embeddings".to_string()),
            style: EndpointStyle::Ollama,
            api_key: None,
        }),
        "lmstudio" => Ok(Endpoint {
            url: env::var("CLAUDEMEM_LMSTUDIO_EMBED_URL")
                .unwrap_or_else(|_| "http://localhost:1234/v1/embeddings".to_string()),
            style: EndpointStyle::OpenAiCompatible,
            api_key: None,
        }),
        other => Err(SearchError::Configuration(format!(
            "unknown remote embed namespace: {other}"
        ))),
    }
}

/// Namespaces that require a bearer token to call.
fn requires_auth(spec: &ModelSpec) -> bool {
    matches!(spec.namespace.as_str(), "openrouter" | "voyage")
}

#[derive(Debug, Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedDatum>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedDatum {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

pub struct RemoteProvider {
    client: reqwest::Client,
    endpoint: Endpoint,
    spec: ModelSpec,
    dimension: Arc<tokio::sync::RwLock<Option<usize>>>,
    batch_size: usize,
    parallelism: usize,
}

impl RemoteProvider {
    pub fn new(spec: ModelSpec) -> Result<Self> {
        let endpoint = resolve_endpoint(&spec)?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            endpoint,
            spec,
            dimension: Arc::new(tokio::sync::RwLock::new(None)),
            batch_size: DEFAULT_BATCH_SIZE,
            parallelism: DEFAULT_PARALLELISM,
        })
    }

    async fn record_dimension(&self, dim: usize) {
        let mut guard = self.dimension.write().await;
        if guard.is_none() {
            *guard = Some(dim);
        }
    }

    /// Send one batch with retry/backoff; fast-fails on auth errors.
    /// Returns `None` for the whole batch if every attempt is exhausted,
    /// so the caller can isolate the failure per spec.md §4.1.
    async fn send_batch(&self, texts: &[String]) -> Option<(Vec<Vec<f32>>, UsageRecord)> {
        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_to_budget(t, &self.spec))
            .collect();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_batch_once(&truncated).await {
                Ok(result) => return Some(result),
                Err(SearchError::Authentication(msg)) => {
                    warn!("authentication failure, not retrying: {msg}");
                    return None;
                }
                Err(e) if attempt >= MAX_ATTEMPTS => {
                    warn!("batch failed after {attempt} attempts: {e}");
                    return None;
                }
                Err(e) => {
                    let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    debug!("batch attempt {attempt} failed ({e}), retrying in {backoff:?}");
                    sleep(backoff).await;
                }
            }
        }
    }

    async fn send_batch_once(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, UsageRecord)> {
        match self.endpoint.style {
            EndpointStyle::OpenAiCompatible => self.send_openai_compatible(texts).await,
            EndpointStyle::Ollama => self.send_ollama(texts).await,
        }
    }

    async fn send_openai_compatible(
        &self,
        texts: &[String],
    ) -> Result<(Vec<Vec<f32>>, UsageRecord)> {
        if requires_auth(&self.spec) && self.endpoint.api_key.is_none() {
            return Err(SearchError::Authentication(format!(
                "no API key configured for {}",
                self.spec.namespace
            )));
        }

        let body = OpenAiEmbedRequest {
            model: &self.spec.model,
            input: texts,
        };
        let mut request = self.client.post(&self.endpoint.url).json(&body);
        if let Some(key) = &self.endpoint.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        classify_status(response.status())?;

        let parsed: OpenAiEmbedResponse = response.json().await?;
        let mut vectors = vec![Vec::new(); texts.len()];
        for datum in parsed.data {
            if let Some(slot) = vectors.get_mut(datum.index) {
                *slot = datum.embedding;
            }
        }

        let usage = UsageRecord {
            prompt_tokens: parsed
                .usage
                .as_ref()
                .and_then(|u| u.prompt_tokens.or(u.total_tokens)),
            cost_usd: None,
        };
        Ok((vectors, usage))
    }

    async fn send_ollama(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, UsageRecord)> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let body = OllamaEmbedRequest {
                model: &self.spec.model,
                prompt: text,
            };
            let response = self.client.post(&self.endpoint.url).json(&body).send().await?;
            classify_status(response.status())?;
            let parsed: OllamaEmbedResponse = response.json().await?;
            vectors.push(parsed.embedding);
        }
        Ok((vectors, UsageRecord::default()))
    }
}

fn classify_status(status: reqwest::StatusCode) -> Result<()> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SearchError::Authentication(format!("http {status}")));
    }
    if !status.is_success() {
        return Err(SearchError::Transient(format!("http {status}")));
    }
    Ok(())
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn embed(
        &self,
        texts: Vec<String>,
        progress: Option<&ProgressCallback>,
    ) -> Result<EmbedOutcome> {
        if texts.is_empty() {
            return Ok(EmbedOutcome::default());
        }

        let total = texts.len();
        let batches: Vec<Vec<String>> = texts
            .chunks(self.batch_size)
            .map(|c| c.to_vec())
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(batches.len());
        for (batch_idx, batch) in batches.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let this = self;
            handles.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                let result = this.send_batch(&batch).await;
                (batch_idx, batch.len(), result)
            });
        }

        let results = futures::future::join_all(handles).await;

        let mut vectors = vec![Vec::new(); total];
        let mut prompt_tokens = 0u64;
        let mut have_tokens = false;
        let mut skipped = 0usize;
        let mut completed = 0usize;

        for (batch_idx, batch_len, result) in results {
            let offset = batch_idx * self.batch_size;
            match result {
                Some((batch_vectors, usage)) => {
                    for (i, v) in batch_vectors.into_iter().enumerate() {
                        if v.is_empty() {
                            skipped += 1;
                        }
                        if let Some(slot) = vectors.get_mut(offset + i) {
                            *slot = v;
                        }
                    }
                    if let Some(tokens) = usage.prompt_tokens {
                        prompt_tokens += tokens;
                        have_tokens = true;
                    }
                }
                None => {
                    skipped += batch_len;
                }
            }
            completed += batch_len;
            if let Some(cb) = progress {
                cb(completed, total);
            }
        }

        if let Some(first) = vectors.iter().find(|v| !v.is_empty()) {
            self.record_dimension(first.len()).await;
        }

        let cost_usd = if have_tokens {
            Some((prompt_tokens as f64 / 1_000_000.0) * price_per_million(&self.spec))
        } else {
            None
        };

        Ok(EmbedOutcome {
            vectors,
            prompt_tokens: have_tokens.then_some(prompt_tokens),
            cost_usd,
            skipped,
        })
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let start = std::time::Instant::now();
        match self.send_batch_once(&["ping".to_string()]).await {
            Ok(_) => Ok(ProviderStatus::healthy(self.spec.raw.clone(), "remote")
                .with_latency(start.elapsed().as_millis() as u64)),
            Err(e) => Ok(ProviderStatus::unavailable(self.spec.raw.clone(), e.to_string())),
        }
    }

    async fn warmup(&self) -> Result<()> {
        let _ = self.send_batch_once(&["warmup".to_string()]).await?;
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        self.dimension
            .try_read()
            .ok()
            .and_then(|g| *g)
            .unwrap_or(0)
    }

    fn model_spec(&self) -> &ModelSpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_namespaces() {
        assert!(resolve_endpoint(&ModelSpec::parse("ollama/nomic-embed-text")).is_ok());
    }

    #[test]
    fn unknown_namespace_is_configuration_error() {
        let spec = ModelSpec {
            raw: "bogus/foo".to_string(),
            namespace: "bogus".to_string(),
            model: "foo".to_string(),
        };
        assert!(matches!(
            resolve_endpoint(&spec),
            Err(SearchError::Configuration(_))
        ));
    }

    #[test]
    fn classify_status_flags_auth_failures() {
        assert!(matches!(
            classify_status(reqwest::StatusCode::UNAUTHORIZED),
            Err(SearchError::Authentication(_))
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::FORBIDDEN),
            Err(SearchError::Authentication(_))
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            Err(SearchError::Transient(_))
        ));
        assert!(classify_status(reqwest::StatusCode::OK).is_ok());
    }
}
