//! CLI command implementations (spec.md §6).

pub mod analysis;
pub mod clean;
pub mod clear;
pub mod config;
pub mod doctor;
pub mod index;
pub mod init;
pub mod mcp;
pub mod search;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use claudemem_backend::{BackendError, LocalBackend};
use claudemem_config::{ClaudememConfig, ConfigError, ConfigLoader};
use thiserror::Error;

use crate::GlobalOptions;

/// Error type returned by every command, carrying the exit code spec.md §6
/// assigns to its kind (0 success; 1 usage; 2 runtime; 3 configuration).
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Mcp(#[from] claudemem_mcp::McpError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage(_) => 1,
            CliError::Backend(BackendError::Configuration(_) | BackendError::Config(_)) => 3,
            CliError::Config(_) => 3,
            CliError::Backend(_) | CliError::Io(_) | CliError::Mcp(_) => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Resolve the project path from options or the current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    match &global.workspace {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir().map_err(CliError::from),
    }
}

/// Load and merge configuration for `workspace`, applying CLI overrides.
///
/// `--config` points at a standalone project-config file rather than the
/// conventional `<workspace>/claudemem.json`, so it's read directly instead
/// of going through [`ConfigLoader::load`]'s path convention.
pub fn load_config(global: &GlobalOptions, workspace: &std::path::Path, no_llm: bool) -> Result<ClaudememConfig> {
    let loader = ConfigLoader::new();
    let mut config = if let Some(config_path) = &global.config {
        let text = std::fs::read_to_string(config_path)?;
        serde_json::from_str(&text).map_err(|e| CliError::Usage(format!("invalid config file: {e}")))?
    } else {
        loader.load(workspace, None)?
    };

    let overrides = global.to_overrides(no_llm);
    config.apply_overrides(&overrides);
    config.validate()?;
    Ok(config)
}

/// Load configuration and construct a backend for the resolved workspace.
pub async fn create_backend(global: &GlobalOptions, no_llm: bool) -> Result<(Arc<LocalBackend>, PathBuf)> {
    let workspace = resolve_workspace(global)?;
    let config = load_config(global, &workspace, no_llm)?;
    let backend = LocalBackend::new(&config, &workspace).await?;
    Ok((Arc::new(backend), workspace))
}

/// Print a user-facing result line, respecting `--quiet`.
pub fn print_result(message: impl std::fmt::Display, quiet: bool) {
    if !quiet {
        println!("{message}");
    }
}

/// Print an error message to stderr.
pub fn print_error(message: &str) {
    eprintln!("error: {message}");
}

/// Print a warning message to stderr.
pub fn print_warning(message: &str) {
    eprintln!("warning: {message}");
}

/// Print an info message to stderr, respecting `--quiet`.
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}
