//! `claudemem config` — view, set, or locate configuration (spec.md §6).

use std::path::PathBuf;

use clap::Subcommand;

use claudemem_config::{ClaudememConfig, ConfigLoader};

use super::{load_config, print_info, resolve_workspace, CliError, Result};
use crate::GlobalOptions;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the resolved (global + project + CLI overrides) configuration.
    Show,

    /// Print the paths the global and project config files are read from.
    Path,

    /// Print one configuration value by dotted key.
    Get { key: String },

    /// Set one configuration value by dotted key, writing the project file
    /// by default (`--global` writes `~/.claudemem/config.json` instead).
    Set {
        key: String,
        value: String,
        #[arg(long)]
        global: bool,
    },
}

/// Known dotted keys `config get`/`config set` accept. Kept as an explicit
/// allowlist rather than reflection, mirroring how [`ClaudememConfig::apply_overrides`]
/// only recognizes a fixed set of CLI-level fields.
fn get_value(config: &ClaudememConfig, key: &str) -> Result<String> {
    Ok(match key {
        "default_embed_model" => config.default_embed_model.clone(),
        "default_chat_model" => config.default_chat_model.clone(),
        "storage.dir_name" => config.storage.dir_name.clone(),
        "storage.schema_version" => config.storage.schema_version.to_string(),
        "retrieval.dense_weight" => config.retrieval.dense_weight.to_string(),
        "retrieval.lexical_weight" => config.retrieval.lexical_weight.to_string(),
        "retrieval.pagerank_weight" => config.retrieval.pagerank_weight.to_string(),
        "retrieval.top_k" => config.retrieval.top_k.to_string(),
        "retrieval.adaptive" => config.retrieval.adaptive.to_string(),
        "refinement.enabled" => config.refinement.enabled.to_string(),
        "refinement.max_rounds" => config.refinement.max_rounds.to_string(),
        "refinement.target_rank" => config.refinement.target_rank.to_string(),
        "analysis.dead_code_max_pagerank" => config.analysis.dead_code_max_pagerank.to_string(),
        "analysis.test_gap_min_pagerank" => config.analysis.test_gap_min_pagerank.to_string(),
        "analysis.impact_max_depth" => config.analysis.impact_max_depth.to_string(),
        "analysis.impact_max_nodes" => config.analysis.impact_max_nodes.to_string(),
        "logging.level" => config.logging.level.clone(),
        "graph.second_pass_resolution" => config.graph.second_pass_resolution.to_string(),
        other => return Err(CliError::Usage(format!("unknown configuration key '{other}'"))),
    })
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Usage(format!("invalid value '{value}' for '{key}'")))
}

fn set_value(config: &mut ClaudememConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "default_embed_model" => config.default_embed_model = value.to_string(),
        "default_chat_model" => config.default_chat_model = value.to_string(),
        "storage.dir_name" => config.storage.dir_name = value.to_string(),
        "storage.schema_version" => config.storage.schema_version = parse_value(key, value)?,
        "retrieval.dense_weight" => config.retrieval.dense_weight = parse_value(key, value)?,
        "retrieval.lexical_weight" => config.retrieval.lexical_weight = parse_value(key, value)?,
        "retrieval.pagerank_weight" => config.retrieval.pagerank_weight = parse_value(key, value)?,
        "retrieval.top_k" => config.retrieval.top_k = parse_value(key, value)?,
        "retrieval.adaptive" => config.retrieval.adaptive = parse_value(key, value)?,
        "refinement.enabled" => config.refinement.enabled = parse_value(key, value)?,
        "refinement.max_rounds" => config.refinement.max_rounds = parse_value(key, value)?,
        "refinement.target_rank" => config.refinement.target_rank = parse_value(key, value)?,
        "analysis.dead_code_max_pagerank" => config.analysis.dead_code_max_pagerank = parse_value(key, value)?,
        "analysis.test_gap_min_pagerank" => config.analysis.test_gap_min_pagerank = parse_value(key, value)?,
        "analysis.impact_max_depth" => config.analysis.impact_max_depth = parse_value(key, value)?,
        "analysis.impact_max_nodes" => config.analysis.impact_max_nodes = parse_value(key, value)?,
        "logging.level" => config.logging.level = value.to_string(),
        "graph.second_pass_resolution" => config.graph.second_pass_resolution = parse_value(key, value)?,
        other => return Err(CliError::Usage(format!("unknown configuration key '{other}'"))),
    }
    Ok(())
}

pub async fn execute(cmd: ConfigCommand, global: &GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(global)?;
    let loader = ConfigLoader::new();

    match cmd {
        ConfigCommand::Show => {
            let config = load_config(global, &workspace, false)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommand::Path => {
            let global_path: Option<PathBuf> = loader.global_config_path();
            println!(
                "global:  {}",
                global_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(no home directory)".to_string())
            );
            println!("project: {}", loader.project_config_path(&workspace).display());
        }
        ConfigCommand::Get { key } => {
            let config = load_config(global, &workspace, false)?;
            println!("{}", get_value(&config, &key)?);
        }
        ConfigCommand::Set { key, value, global: write_global } => {
            let mut config = loader.load(&workspace, None)?;
            set_value(&mut config, &key, &value)?;
            config.validate()?;
            let path = if write_global {
                loader.save_global(&config)?
            } else {
                loader.save_project(&workspace, &config)?
            };
            print_info(&format!("wrote {} to {}", key, path.display()), global.quiet);
        }
    }

    Ok(())
}
