//! `claudemem --mcp` — runs the tool server over stdio (spec.md §4.11, §6).

use std::sync::Arc;

use clap::Args;

use claudemem_backend::Backend;

use super::{create_backend, Result};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct McpArgs {
    /// Skip LLM-based summary enrichment during the reindex this mode runs before serving.
    #[arg(long)]
    no_llm: bool,
}

pub async fn execute(args: McpArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, workspace) = create_backend(global, args.no_llm).await?;
    tracing::info!("tool server starting over stdio for {}", workspace.display());

    let backend: Arc<dyn Backend> = backend;
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    claudemem_mcp::serve(backend, stdin, stdout).await?;

    Ok(())
}
