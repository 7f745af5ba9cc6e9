//! `claudemem index` — runs the indexing pipeline over changed files (spec.md §4.2, §6).

use std::path::PathBuf;

use clap::Args;
use tokio_util::sync::CancellationToken;

use claudemem_backend::Backend;

use super::{create_backend, print_info, print_result, Result};
use crate::progress::{finish_spinner, finish_spinner_warn, progress_bar};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Project path to index (defaults to the current directory / `--workspace`).
    path: Option<PathBuf>,

    /// Discard the existing index and rebuild from scratch.
    #[arg(long)]
    force: bool,

    /// Skip LLM-based summary enrichment.
    #[arg(long)]
    no_llm: bool,
}

pub async fn execute(args: IndexArgs, global: &GlobalOptions) -> Result<()> {
    let mut global = global.clone();
    if let Some(path) = args.path {
        global.workspace = Some(path);
    }

    let (backend, workspace) = create_backend(&global, args.no_llm).await?;
    print_info(&format!("indexing {}", workspace.display()), global.quiet);

    let cancellation = CancellationToken::new();
    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let pb = progress_bar(0, "indexing files", global.quiet);
    let progress_pb = pb.clone();
    let progress: claudemem_backend::IndexProgressCallback = Box::new(move |done, total| {
        if let Some(pb) = &progress_pb {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }
    });

    let report = backend.index(args.force, cancellation, Some(&progress), None).await?;

    if report.cancelled {
        finish_spinner_warn(pb, "indexing cancelled");
    } else {
        finish_spinner(
            pb,
            &format!(
                "{} files added, {} modified, {} deleted, {} units indexed, {} edges built",
                report.files_added, report.files_modified, report.files_deleted, report.units_indexed, report.edges_built
            ),
        );
    }

    if !global.quiet {
        print_result(format!("units enriched: {}", report.units_enriched), false);
        print_result(format!("units embedded: {}", report.units_embedded), false);
        if report.cost_usd > 0.0 {
            print_result(format!("estimated cost: ${:.4}", report.cost_usd), false);
        }
    }

    Ok(())
}
