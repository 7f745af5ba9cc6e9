//! `claudemem clean` — remove claudemem's on-disk state for a workspace,
//! with confirmation (spec.md §6 persisted state layout).
//!
//! Differs from `claudemem clear` (spec.md §4.8 project-scoped clear): `clear`
//! empties the store's records through [`claudemem_backend::Backend::clear`]
//! while leaving the directory and schema in place; `clean` removes the
//! `<project>/.claudemem/` directory itself from disk.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use super::{load_config, print_info, resolve_workspace, Result};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Skip the confirmation prompt.
    #[arg(long, short = 'f')]
    force: bool,

    /// Show what would be deleted without deleting anything.
    #[arg(long, short = 'n')]
    dry_run: bool,

    /// Emit JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct CleanReport {
    index_dir: PathBuf,
    existed: bool,
    removed: bool,
    dry_run: bool,
}

fn confirm(index_dir: &Path) -> Result<bool> {
    print!("remove {}? [y/N] ", index_dir.display());
    use std::io::Write as _;
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub async fn execute(args: CleanArgs, global: &GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(global)?;
    let config = load_config(global, &workspace, true)?;
    let index_dir = config.index_dir(&workspace);
    let existed = index_dir.exists();

    let mut report = CleanReport {
        index_dir: index_dir.clone(),
        existed,
        removed: false,
        dry_run: args.dry_run,
    };

    if existed && !args.dry_run {
        if !args.force && !global.quiet && !confirm(&index_dir)? {
            print_info("aborted", global.quiet);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            return Ok(());
        }
        std::fs::remove_dir_all(&index_dir)?;
        report.removed = true;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !existed {
        print_info(&format!("{} does not exist; nothing to clean", index_dir.display()), global.quiet);
    } else if args.dry_run {
        print_info(&format!("would remove {}", index_dir.display()), global.quiet);
    } else {
        print_info(&format!("removed {}", index_dir.display()), global.quiet);
    }

    Ok(())
}
