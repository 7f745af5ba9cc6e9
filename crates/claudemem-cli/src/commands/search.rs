//! `claudemem search` — hybrid search over the index (spec.md §4.9, §6).

use clap::Args;
use tokio_util::sync::CancellationToken;

use claudemem_backend::{Backend, SearchOptions};
use claudemem_search::RetrievalMode;

use super::{create_backend, print_info, Result};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query.
    query: String,

    /// Maximum number of results to return.
    #[arg(long, short = 'n', default_value = "10")]
    limit: usize,

    /// Restrict to a source language.
    #[arg(long, short = 'l')]
    language: Option<String>,

    /// Glob filter over unit file paths.
    #[arg(long)]
    path: Option<String>,

    /// Skip the incremental reindex this command would otherwise run first.
    #[arg(long)]
    no_reindex: bool,

    /// Keyword-only mode: bypass the embedding provider entirely.
    #[arg(long, short = 'k')]
    keyword: bool,

    /// Emit JSON instead of a human-readable listing.
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: SearchArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, _workspace) = create_backend(global, true).await?;

    if !args.no_reindex {
        print_info("refreshing index before search", global.quiet);
        backend.index(false, CancellationToken::new(), None, None).await?;
    }

    let options = SearchOptions {
        language: args.language,
        path_glob: args.path,
        unit_type: None,
        mode: if args.keyword { RetrievalMode::KeywordOnly } else { RetrievalMode::Hybrid },
        top_k: Some(args.limit),
    };

    let results = backend.search(&args.query, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        if !global.quiet {
            eprintln!("no results for: {}", args.query);
        }
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} ({}:{}-{})",
            i + 1,
            result.name.as_deref().unwrap_or("<anonymous>"),
            result.file_path,
            result.start_line,
            result.end_line
        );
        println!(
            "   score {:.3} (dense {:.3} lexical {:.3} pagerank {:.3})",
            result.score, result.dense_score, result.lexical_score, result.pagerank_score
        );
        if let Some(summary) = &result.summary {
            println!("   {summary}");
        }
    }

    Ok(())
}
