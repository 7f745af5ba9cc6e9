//! `claudemem clear` — project-scoped clear of the index store (spec.md §4.8, §6).

use clap::Args;

use claudemem_backend::Backend;

use super::{create_backend, print_info, Result};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    yes: bool,
}

pub async fn execute(args: ClearArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, workspace) = create_backend(global, true).await?;

    if !args.yes && !global.quiet {
        print!("clear the index for {}? [y/N] ", workspace.display());
        use std::io::Write as _;
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        if !matches!(line.trim().to_lowercase().as_str(), "y" | "yes") {
            print_info("aborted", global.quiet);
            return Ok(());
        }
    }

    backend.clear().await?;
    print_info("index cleared", global.quiet);
    Ok(())
}
