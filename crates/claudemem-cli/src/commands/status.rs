//! `claudemem status` — index freshness and storage stats (spec.md §6).

use clap::Args;

use claudemem_backend::Backend;

use super::{create_backend, load_config, resolve_workspace, Result};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Include the resolved configuration in the output.
    #[arg(long = "show-config")]
    show_config: bool,

    /// Emit JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: StatusArgs, global: &GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(global)?;
    let config = load_config(global, &workspace, false)?;
    let index_dir = config.index_dir(&workspace);
    let initialized = index_dir.exists();

    if args.json {
        let mut payload = serde_json::json!({
            "workspace": workspace,
            "index_dir": index_dir,
            "initialized": initialized,
        });
        if initialized {
            let (backend, _) = create_backend(global, true).await?;
            let status = backend.index_status().await?;
            payload["index"] = serde_json::to_value(&status)?;
            match backend.check_provider().await {
                Ok(provider) => payload["provider"] = serde_json::to_value(&provider)?,
                Err(e) => payload["provider_error"] = serde_json::json!(e.to_string()),
            }
        }
        if args.show_config {
            payload["config"] = serde_json::to_value(&config)?;
        }
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("claudemem workspace status");
    println!("==========================\n");
    println!("Workspace:  {}", workspace.display());
    println!("Index dir:  {}", index_dir.display());
    println!("Status:     {}", if initialized { "initialized" } else { "not initialized" });

    if !initialized {
        println!("\nRun `claudemem index` to build the project's index.");
        return Ok(());
    }

    let (backend, _) = create_backend(global, true).await?;
    let status = backend.index_status().await?;
    println!("\nIndex:");
    println!("  Units:        {}", status.unit_count);
    println!("  Files:        {}", status.file_count);
    println!("  Edges:        {}", status.edge_count);
    println!(
        "  Embed model:  {}",
        status.embedding_model.as_deref().unwrap_or("(none)")
    );
    if let Some(dim) = status.embedding_dimension {
        println!("  Dimension:    {dim}");
    }
    println!("  Schema:       v{}", status.schema_version);

    println!("\nEmbed provider:");
    match backend.check_provider().await {
        Ok(provider) => {
            println!("  Model:      {}", provider.model);
            println!("  Device:     {}", provider.device);
            println!("  Available:  {}", provider.available);
            if let Some(latency) = provider.latency_ms {
                println!("  Latency:    {latency}ms");
            }
            if let Some(err) = &provider.error {
                println!("  Error:      {err}");
            }
        }
        Err(e) => println!("  Error:      {e}"),
    }

    if args.show_config {
        println!("\nConfig:");
        println!("  Embed model:  {}", config.default_embed_model);
        println!("  Chat model:   {}", config.default_chat_model);
        println!(
            "  Weights:      dense={:.2} lexical={:.2} pagerank={:.2}",
            config.retrieval.dense_weight, config.retrieval.lexical_weight, config.retrieval.pagerank_weight
        );
        println!("  Refinement:   enabled={}", config.refinement.enabled);
    }

    Ok(())
}
