//! claudemem — local-first semantic code intelligence engine (spec.md §6 CLI surface).
//!
//! ```bash
//! # Index the current project
//! claudemem index
//!
//! # Search semantically
//! claudemem search "authentication logic"
//!
//! # Inspect the symbol graph
//! claudemem callers validate_token
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// claudemem — local-first semantic code intelligence engine.
#[derive(Parser, Debug)]
#[command(name = "claudemem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Options available to every subcommand (spec.md §6: "all take a project
/// path defaulting to the current working directory").
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Project path to operate on.
    #[arg(long, short = 'w', global = true)]
    workspace: Option<PathBuf>,

    /// Path to a project config file, overriding the normal global/project lookup.
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Embed model override, e.g. "local/jina-code".
    #[arg(long, global = true, env = "CLAUDEMEM_MODEL")]
    embed_model: Option<String>,

    /// Chat model override, e.g. "cc/sonnet".
    #[arg(long, global = true, env = "CLAUDEMEM_LLM")]
    chat_model: Option<String>,

    /// Enable verbose (debug) logging.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    fn to_overrides(&self, no_llm: bool) -> claudemem_config::ConfigOverrides {
        claudemem_config::ConfigOverrides {
            embed_model: self.embed_model.clone(),
            chat_model: self.chat_model.clone(),
            log_level: self.verbose.then(|| "debug".to_string()),
            no_llm: Some(no_llm),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a global config file and an optional project config file.
    Init(commands::init::InitArgs),

    /// Run the indexing pipeline over changed files.
    Index(commands::index::IndexArgs),

    /// Hybrid search over the index.
    Search(commands::search::SearchArgs),

    /// Print index freshness and storage stats.
    Status(commands::status::StatusArgs),

    /// Remove the project's index.
    Clear(commands::clear::ClearArgs),

    /// Highest-PageRank units, optionally filtered by a query.
    Map(commands::analysis::MapArgs),

    /// One-hop callers of a symbol.
    Callers(commands::analysis::SymbolArgs),

    /// One-hop callees of a symbol.
    Callees(commands::analysis::SymbolArgs),

    /// Transitive closure of inverse-reference edges from a symbol.
    Impact(commands::analysis::SymbolArgs),

    /// Units with no incoming references and low PageRank.
    #[command(name = "dead-code")]
    DeadCode(commands::analysis::DeadCodeArgs),

    /// Important units with no referencing unit in a test directory.
    #[command(name = "test-gaps")]
    TestGaps(commands::analysis::TestGapsArgs),

    /// Health check over config, storage, and the embed provider.
    Doctor(commands::doctor::DoctorArgs),

    /// Remove claudemem's on-disk state, with confirmation.
    Clean(commands::clean::CleanArgs),

    /// View, set, or locate configuration.
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Run the tool server over stdio (spec.md §4.11).
    Mcp(commands::mcp::McpArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // The tool server shares stdout with its wire protocol; logging there
    // must go to stderr with ansi disabled, same as the teacher's mcp mode.
    let ansi = !matches!(cli.command, Commands::Mcp(_));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a global tracing subscriber was already set");
    }

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, &cli.global).await,
        Commands::Index(args) => commands::index::execute(args, &cli.global).await,
        Commands::Search(args) => commands::search::execute(args, &cli.global).await,
        Commands::Status(args) => commands::status::execute(args, &cli.global).await,
        Commands::Clear(args) => commands::clear::execute(args, &cli.global).await,
        Commands::Map(args) => commands::analysis::map(args, &cli.global).await,
        Commands::Callers(args) => commands::analysis::callers(args, &cli.global).await,
        Commands::Callees(args) => commands::analysis::callees(args, &cli.global).await,
        Commands::Impact(args) => commands::analysis::impact(args, &cli.global).await,
        Commands::DeadCode(args) => commands::analysis::dead_code(args, &cli.global).await,
        Commands::TestGaps(args) => commands::analysis::test_gaps(args, &cli.global).await,
        Commands::Doctor(args) => commands::doctor::execute(args, &cli.global).await,
        Commands::Clean(args) => commands::clean::execute(args, &cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, &cli.global).await,
        Commands::Mcp(args) => commands::mcp::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            commands::print_error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}
