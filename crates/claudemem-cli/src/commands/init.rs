//! `claudemem init` — interactive setup writing a global config file and an
//! optional project config file (spec.md §6).

use std::io::{self, Write as _};

use clap::Args;

use claudemem_config::{ClaudememConfig, ConfigLoader};

use super::{print_info, Result};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Skip interactive prompts and accept defaults.
    #[arg(long, short = 'y')]
    yes: bool,

    /// Also write a project-local `claudemem.json` with these defaults.
    #[arg(long)]
    project: bool,
}

/// Prompt for a value, returning `default` if the user presses enter or
/// `--yes` was given.
fn prompt(message: &str, default: &str, yes: bool) -> io::Result<String> {
    if yes {
        return Ok(default.to_string());
    }
    print!("{message} [{default}]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let trimmed = line.trim();
    Ok(if trimmed.is_empty() { default.to_string() } else { trimmed.to_string() })
}

pub async fn execute(args: InitArgs, global: &GlobalOptions) -> Result<()> {
    let workspace = super::resolve_workspace(global)?;
    let loader = ConfigLoader::new();

    let mut config = ClaudememConfig::default();
    config.default_embed_model = prompt(
        "Default embed model (e.g. local/jina-code, voyage-code-3)",
        &config.default_embed_model,
        args.yes,
    )?;
    config.default_chat_model = prompt(
        "Default chat model (e.g. cc/sonnet, or/openai/gpt-4o)",
        &config.default_chat_model,
        args.yes,
    )?;
    config.validate()?;

    let global_path = loader.save_global(&config)?;
    print_info(&format!("wrote global config to {}", global_path.display()), global.quiet);

    if args.project {
        let project_path = loader.save_project(&workspace, &config)?;
        print_info(&format!("wrote project config to {}", project_path.display()), global.quiet);
    }

    print_info("run `claudemem index` to build the project's index", global.quiet);
    Ok(())
}
