//! Local embedding provider using Candle and the Jina code embedding model.
//!
//! GPU acceleration via compile-time features:
//! - `--features metal` for macOS Metal/MPS
//! - `--features cuda` for NVIDIA CUDA
//!
//! Local/CPU inference processes texts one mini-batch at a time rather than
//! dispatching concurrent batch groups the way a remote provider does
//! (spec.md §4.1 Batching) — there's no network round-trip to hide, and
//! Candle is already using every core/GPU lane it has within one forward pass.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use hf_hub::{api::sync::Api, Repo, RepoType};
use once_cell::sync::OnceCell;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer};
use tracing::{debug, info};

use super::jina_bert_v2::{BertModel as JinaBertV2Model, Config as JinaV2Config};
use super::provider::{
    EmbedOutcome, EmbeddingProvider, ModelSpec, ProgressCallback, ProviderStatus,
};
use crate::error::{Result, SearchError};

pub const EMBEDDING_DIM: usize = 768;

const DTYPE: DType = DType::F32;
const MINI_BATCH_SIZE: usize = 16;

/// Hugging Face Hub repository backing `local/jina-code`.
const DEFAULT_MODEL_ID: &str = "jinaai/jina-embeddings-v2-base-code";

/// Local embedding provider using Candle for inference.
///
/// Uses `Arc<LocalProviderInner>` for interior clonability, required for
/// `spawn_blocking` to move the provider into the blocking task. Model
/// weights are loaded lazily on first use via `OnceCell`.
#[derive(Clone)]
pub struct LocalProvider {
    inner: Arc<LocalProviderInner>,
}

struct LocalProviderInner {
    model: OnceCell<LoadedModel>,
    device: Device,
    spec: ModelSpec,
    hub_model_id: String,
}

struct LoadedModel {
    model: JinaBertV2Model,
    tokenizer: Tokenizer,
}

impl LocalProvider {
    /// Create a provider for `local/<name>`, resolving device automatically
    /// (Metal > CUDA > CPU). `hub_model_id` is the Hugging Face repo to pull
    /// weights from; unknown local model names still resolve to the default
    /// code embedding model.
    pub fn new(spec: ModelSpec) -> Result<Self> {
        let device = select_device();
        let hub_model_id = DEFAULT_MODEL_ID.to_string();
        Ok(Self {
            inner: Arc::new(LocalProviderInner {
                model: OnceCell::new(),
                device,
                spec,
                hub_model_id,
            }),
        })
    }

    pub fn device(&self) -> &Device {
        &self.inner.device
    }

    fn device_name(&self) -> String {
        match &self.inner.device {
            Device::Cpu => "CPU".to_string(),
            #[cfg(feature = "metal")]
            Device::Metal(_) => "Metal".to_string(),
            #[cfg(feature = "cuda")]
            Device::Cuda(_) => "CUDA".to_string(),
            #[allow(unreachable_patterns)]
            _ => "Unknown".to_string(),
        }
    }

    fn ensure_model(&self) -> Result<&LoadedModel> {
        self.inner
            .model
            .get_or_try_init(|| load_model(&self.inner.hub_model_id, &self.inner.device))
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.model.get().is_some()
    }

    fn encode_sync(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let loaded = self.ensure_model()?;
        let mut result = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MINI_BATCH_SIZE) {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let mut vectors = encode_with_model(
                &loaded.model,
                &loaded.tokenizer,
                &self.inner.device,
                &refs,
            )?;
            result.append(&mut vectors);
        }
        Ok(result)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed(
        &self,
        texts: Vec<String>,
        progress: Option<&ProgressCallback>,
    ) -> Result<EmbedOutcome> {
        let provider = self.clone();
        let total = texts.len();
        let vectors = tokio::task::spawn_blocking(move || provider.encode_sync(&texts))
            .await
            .map_err(|e| SearchError::Inference(format!("blocking task panicked: {e}")))??;

        // Local inference has no intermediate batch boundary worth reporting
        // across the async/blocking split; a single completion tick keeps
        // the progress contract honest without threading a callback through
        // spawn_blocking's 'static bound.
        if let Some(cb) = progress {
            cb(total, total);
        }

        Ok(EmbedOutcome {
            vectors,
            prompt_tokens: None,
            cost_usd: Some(0.0),
            skipped: 0,
        })
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let device = self.device_name();
        if self.is_loaded() {
            return Ok(ProviderStatus::healthy(self.inner.spec.raw.clone(), device));
        }
        match check_model_cached(&self.inner.hub_model_id) {
            Ok(()) => Ok(ProviderStatus::healthy(self.inner.spec.raw.clone(), device)),
            Err(e) => Ok(ProviderStatus::unavailable(self.inner.spec.raw.clone(), e)),
        }
    }

    async fn warmup(&self) -> Result<()> {
        let provider = self.clone();
        let start = Instant::now();
        tokio::task::spawn_blocking(move || provider.ensure_model().map(|_| ()))
            .await
            .map_err(|e| SearchError::Inference(format!("warmup task panicked: {e}")))??;
        info!("local embedding model ready in {:?}", start.elapsed());
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn model_spec(&self) -> &ModelSpec {
        &self.inner.spec
    }
}

fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            info!("using Metal GPU acceleration for local embeddings");
            return device;
        }
    }
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("using CUDA GPU acceleration for local embeddings");
            return device;
        }
    }
    debug!("using CPU for local embeddings");
    Device::Cpu
}

fn check_model_cached(model_id: &str) -> std::result::Result<(), String> {
    let api = Api::new().map_err(|e| format!("huggingface api unavailable: {e}"))?;
    let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, "main".to_string());
    api.repo(repo)
        .info()
        .map(|_| ())
        .map_err(|e| format!("model not available: {e}"))
}

fn download_model_files(model_id: &str) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let api = Api::new().map_err(|e| SearchError::ProviderUnavailable(format!("hf api: {e}")))?;
    let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, "main".to_string());
    let api_repo = api.repo(repo);

    let config = api_repo
        .get("config.json")
        .map_err(|e| SearchError::ProviderUnavailable(format!("config.json: {e}")))?;
    let tokenizer = api_repo
        .get("tokenizer.json")
        .map_err(|e| SearchError::ProviderUnavailable(format!("tokenizer.json: {e}")))?;
    let weights = api_repo
        .get("model.safetensors")
        .map_err(|e| SearchError::ProviderUnavailable(format!("model.safetensors: {e}")))?;

    Ok((config, tokenizer, weights))
}

fn load_model(model_id: &str, device: &Device) -> Result<LoadedModel> {
    info!("loading local embedding model ({model_id})...");
    let (config_path, tokenizer_path, weights_path) = download_model_files(model_id)?;

    let config_str = std::fs::read_to_string(&config_path)?;
    let config: JinaV2Config = serde_json::from_str(&config_str)?;

    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| SearchError::ProviderUnavailable(format!("tokenizer load failed: {e}")))?;

    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, device)? };
    let model = JinaBertV2Model::new(vb, &config)?;

    info!("local embedding model loaded (dim={EMBEDDING_DIM})");
    Ok(LoadedModel { model, tokenizer })
}

fn normalize_l2(v: &Tensor) -> Result<Tensor> {
    Ok(v.broadcast_div(&v.sqr()?.sum_keepdim(1)?.sqrt()?)?)
}

fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let attention_mask_expanded = attention_mask.to_dtype(DTYPE)?.unsqueeze(2)?;
    let sum_mask = attention_mask_expanded.sum(1)?;
    let masked_embeddings = embeddings.broadcast_mul(&attention_mask_expanded)?;
    let summed = masked_embeddings.sum(1)?;
    Ok(summed.broadcast_div(&sum_mask)?)
}

fn encode_with_model(
    model: &JinaBertV2Model,
    tokenizer: &Tokenizer,
    device: &Device,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>> {
    let mut tokenizer = tokenizer.clone();
    // jina-embeddings-v2-base-code pads with <pad> (id 1), not the tokenizer
    // default of 0; the tokenizer.json doesn't encode this so it's set here.
    let padding = PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id: 1,
        pad_token: "<pad>".to_string(),
        ..Default::default()
    };
    tokenizer.with_padding(Some(padding));

    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| SearchError::Inference(format!("tokenization failed: {e}")))?;

    let token_ids: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_ids(), device))
        .collect::<std::result::Result<_, _>>()?;
    let attention_masks: Vec<Tensor> = encodings
        .iter()
        .map(|enc| Tensor::new(enc.get_attention_mask(), device))
        .collect::<std::result::Result<_, _>>()?;

    let token_ids = Tensor::stack(&token_ids, 0)?;
    let attention_mask = Tensor::stack(&attention_masks, 0)?;

    let embeddings = model.forward_with_mask(&token_ids, Some(&attention_mask))?;
    let pooled = mean_pool(&embeddings, &attention_mask)?;
    let normalized = normalize_l2(&pooled)?;

    let result: Vec<Vec<f32>> = (0..normalized.dim(0)?)
        .map(|i| normalized.get(i)?.to_vec1::<f32>())
        .collect::<std::result::Result<_, _>>()?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ModelSpec {
        ModelSpec::parse("local/jina-code")
    }

    #[test]
    fn provider_creation_succeeds() {
        assert!(LocalProvider::new(spec()).is_ok());
    }

    #[test]
    fn embedding_dim_is_768() {
        let provider = LocalProvider::new(spec()).unwrap();
        assert_eq!(provider.embedding_dim(), EMBEDDING_DIM);
    }

    #[test]
    fn empty_input_returns_empty_vectors() {
        let provider = LocalProvider::new(spec()).unwrap();
        let result = provider.encode_sync(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn check_status_reports_model_identity() {
        let provider = LocalProvider::new(spec()).unwrap();
        let status = provider.check_status().await.unwrap();
        assert_eq!(status.model, "local/jina-code");
    }

    #[tokio::test]
    #[ignore] // requires model download
    async fn embed_produces_unit_length_vectors() {
        let provider = LocalProvider::new(spec()).unwrap();
        let out = provider
            .embed(vec!["fn main() {}".to_string()], None)
            .await
            .unwrap();
        assert_eq!(out.vectors.len(), 1);
        assert_eq!(out.vectors[0].len(), EMBEDDING_DIM);
    }
}
