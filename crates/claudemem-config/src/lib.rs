//! claudemem configuration loading.
//!
//! Two JSON layers merge into one [`ClaudememConfig`] (spec.md §6):
//!
//! - global: `~/.claudemem/config.json` — default provider models, endpoint
//!   overrides, the pricing-table override (spec.md §9 open question).
//! - project: `<project>/claudemem.json` — per-project overrides (storage
//!   directory name, analysis thresholds, retrieval weights).
//!
//! Merge order is global → project → CLI overrides, each layer only
//! replacing fields it actually sets.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for claudemem, after merging global + project + CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudememConfig {
    /// Embed model spec, e.g. "local/jina-code", "voyage-code-3" (spec.md §4.1).
    pub default_embed_model: String,
    /// Chat model spec, e.g. "cc/sonnet", "or/openai/gpt-4o" (spec.md §4.1).
    pub default_chat_model: String,
    /// Per-namespace endpoint URL overrides (e.g. "ollama" -> "http://localhost:11434").
    pub endpoints: HashMap<String, String>,
    /// Per-model USD-per-million-token price overrides (spec.md §9 open question).
    pub pricing_overrides: HashMap<String, f64>,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub refinement: RefinementConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
    pub graph: GraphConfig,
}

impl Default for ClaudememConfig {
    fn default() -> Self {
        Self {
            default_embed_model: "local/jina-code".to_string(),
            default_chat_model: "cc/sonnet".to_string(),
            endpoints: HashMap::new(),
            pricing_overrides: HashMap::new(),
            storage: StorageConfig::default(),
            retrieval: RetrievalConfig::default(),
            refinement: RefinementConfig::default(),
            analysis: AnalysisConfig::default(),
            logging: LoggingConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl ClaudememConfig {
    /// Validate the merged configuration (spec.md §7 Configuration error kind).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_embed_model.is_empty() {
            return Err(ConfigError::ValidationError(
                "default_embed_model must not be empty".to_string(),
            ));
        }
        if self.default_chat_model.is_empty() {
            return Err(ConfigError::ValidationError(
                "default_chat_model must not be empty".to_string(),
            ));
        }
        self.retrieval.validate()?;
        Ok(())
    }

    /// Resolve the project's claudemem directory, relative to `workspace_root`
    /// unless `storage.dir_name` is itself absolute.
    pub fn index_dir(&self, workspace_root: &std::path::Path) -> PathBuf {
        let dir = PathBuf::from(&self.storage.dir_name);
        if dir.is_absolute() {
            dir
        } else {
            workspace_root.join(dir)
        }
    }

    /// Apply CLI-level overrides (highest-precedence layer).
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref model) = overrides.embed_model {
            self.default_embed_model = model.clone();
        }
        if let Some(ref model) = overrides.chat_model {
            self.default_chat_model = model.clone();
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(no_llm) = overrides.no_llm {
            self.refinement.enabled = !no_llm;
        }
    }
}

/// Storage layout (spec.md §6 persisted state layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Project-relative directory name holding the index (default `.claudemem`).
    pub dir_name: String,
    /// Schema version the store expects; mismatches trigger a rebuild (spec.md §4.8).
    pub schema_version: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir_name: ".claudemem".to_string(),
            schema_version: 1,
        }
    }
}

/// Hybrid retrieval fusion weights (spec.md §4.9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub dense_weight: f64,
    pub lexical_weight: f64,
    pub pagerank_weight: f64,
    pub top_k: usize,
    /// Whether per-project weights drift with feedback events (spec.md §4.9 adaptive weights).
    pub adaptive: bool,
}

impl Default for RetrievalConfig {
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

impl RetrievalConfig {
    const WEIGHT_MIN: f64 = 0.1;
    const WEIGHT_MAX: f64 = 0.8;

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.dense_weight + self.lexical_weight + self.pagerank_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::ValidationError(format!(
                "retrieval weights must sum to 1.0, got {sum}"
            )));
        }
        for (name, w) in [
            ("dense_weight", self.dense_weight),
            ("lexical_weight", self.lexical_weight),
            ("pagerank_weight", self.pagerank_weight),
        ] {
            if !(Self::WEIGHT_MIN..=Self::WEIGHT_MAX).contains(&w) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be within [{}, {}], got {w}",
                    Self::WEIGHT_MIN,
                    Self::WEIGHT_MAX
                )));
            }
        }
        Ok(())
    }
}

/// Enrichment/refinement defaults (spec.md §4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Whether enrichment runs at all (CLI `--no-llm` flips this off).
    pub enabled: bool,
    pub max_rounds: u32,
    /// Target rank for the retrieval-rank quality strategy (e.g. top-3).
    pub target_rank: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rounds: 3,
            target_rank: 3,
        }
    }
}

/// Analysis query thresholds (spec.md §4.10).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub dead_code_max_pagerank: f64,
    pub test_gap_min_pagerank: f64,
    pub impact_max_depth: usize,
    pub impact_max_nodes: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dead_code_max_pagerank: 0.001,
            test_gap_min_pagerank: 0.001,
            impact_max_depth: 10,
            impact_max_nodes: 200,
        }
    }
}

/// Symbol-graph resolution behavior (spec.md §4.6, §9 ambiguous-symbol open question).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Whether ambiguous same-name references get a second resolution pass
    /// once PageRank scores are available, preferring the highest-ranked
    /// candidate over the lexicographically-first one.
    pub second_pass_resolution: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            second_pass_resolution: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// CLI-supplied overrides, applied after the file-based layers merge.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub embed_model: Option<String>,
    pub chat_model: Option<String>,
    pub log_level: Option<String>,
    pub no_llm: Option<bool>,
}
