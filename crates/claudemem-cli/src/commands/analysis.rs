//! `map` / `callers` / `callees` / `impact` / `dead-code` / `test-gaps` —
//! analysis queries over the symbol graph and index (spec.md §4.10, §6).

use clap::Args;

use claudemem_backend::{Backend, NeighborEntry, UnitSummary};

use super::{create_backend, Result};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct MapArgs {
    /// Restrict to units semantically similar to this query.
    query: Option<String>,

    /// Maximum number of units to return.
    #[arg(long, short = 'n', default_value = "20")]
    limit: usize,

    /// Emit JSON instead of a human-readable listing.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct SymbolArgs {
    /// Unit id or bare symbol name.
    symbol: String,

    /// Emit JSON instead of a human-readable listing.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct DeadCodeArgs {
    /// PageRank ceiling for a unit to count as dead (spec.md §4.10 default 0.001).
    #[arg(long)]
    max_pagerank: Option<f64>,

    /// Include units whose `ast_metadata.exported` flag is set.
    #[arg(long)]
    include_exported: bool,

    /// Emit JSON instead of a human-readable listing.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct TestGapsArgs {
    /// Emit JSON instead of a human-readable listing.
    #[arg(long)]
    json: bool,
}

fn print_units(units: &[UnitSummary], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(units)?);
        return Ok(());
    }
    if units.is_empty() {
        eprintln!("no matching units");
        return Ok(());
    }
    for unit in units {
        println!(
            "{} {} ({}:{}-{}) pagerank={:.5}",
            unit.unit_type.as_str(),
            unit.name.as_deref().unwrap_or("<anonymous>"),
            unit.file_path,
            unit.start_line,
            unit.end_line,
            unit.pagerank
        );
    }
    Ok(())
}

fn print_neighbors(entries: &[NeighborEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        eprintln!("no neighbors");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{} [{}x{}] {} ({}:{}-{})",
            entry.edge_type,
            entry.occurrences,
            if entry.occurrences == 1 { "" } else { "s" },
            entry.unit.name.as_deref().unwrap_or("<anonymous>"),
            entry.unit.file_path,
            entry.unit.start_line,
            entry.unit.end_line
        );
    }
    Ok(())
}

pub async fn map(args: MapArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, _workspace) = create_backend(global, true).await?;
    let units = backend.map(args.query.as_deref(), args.limit).await?;
    print_units(&units, args.json)
}

pub async fn callers(args: SymbolArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, _workspace) = create_backend(global, true).await?;
    let entries = backend.callers(&args.symbol).await?;
    print_neighbors(&entries, args.json)
}

pub async fn callees(args: SymbolArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, _workspace) = create_backend(global, true).await?;
    let entries = backend.callees(&args.symbol).await?;
    print_neighbors(&entries, args.json)
}

pub async fn impact(args: SymbolArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, _workspace) = create_backend(global, true).await?;
    let result = backend.impact(&args.symbol).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!(
        "{} unit(s) transitively reference {}{}",
        result.affected.len(),
        result.root_unit_id,
        if result.truncated { " (truncated)" } else { "" }
    );
    print_units(&result.affected, false)
}

pub async fn dead_code(args: DeadCodeArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, _workspace) = create_backend(global, true).await?;
    let entries = backend.dead_code(args.include_exported, args.max_pagerank).await?;
    print_units(&entries, args.json)
}

pub async fn test_gaps(args: TestGapsArgs, global: &GlobalOptions) -> Result<()> {
    let (backend, _workspace) = create_backend(global, true).await?;
    let entries = backend.test_gaps().await?;
    print_units(&entries, args.json)
}
