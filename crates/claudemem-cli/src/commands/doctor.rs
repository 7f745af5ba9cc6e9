//! `claudemem doctor` — health check over config, storage, and the embed
//! provider (spec.md §6, §7 error taxonomy).

use clap::Args;
use serde::Serialize;

use claudemem_backend::Backend;

use super::{create_backend, load_config, resolve_workspace, Result};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Emit JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    ok: bool,
    detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), ok: true, detail: detail.into() }
    }
    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), ok: false, detail: detail.into() }
    }
}

pub async fn execute(args: DoctorArgs, global: &GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(global)?;
    let mut checks = Vec::new();

    let config = match load_config(global, &workspace, false) {
        Ok(config) => {
            checks.push(CheckResult::pass(
                "config",
                format!("embed={} chat={}", config.default_embed_model, config.default_chat_model),
            ));
            Some(config)
        }
        Err(e) => {
            checks.push(CheckResult::fail("config", e.to_string()));
            None
        }
    };

    if let Some(config) = &config {
        let index_dir = config.index_dir(&workspace);
        if index_dir.exists() {
            checks.push(CheckResult::pass("storage", format!("{} exists", index_dir.display())));
        } else {
            checks.push(CheckResult::fail(
                "storage",
                format!("{} does not exist; run `claudemem index`", index_dir.display()),
            ));
        }
    }

    match create_backend(global, true).await {
        Ok((backend, _)) => match backend.check_provider().await {
            Ok(status) if status.available => checks.push(CheckResult::pass(
                "embed_provider",
                format!("{} on {}", status.model, status.device),
            )),
            Ok(status) => checks.push(CheckResult::fail(
                "embed_provider",
                status.error.unwrap_or_else(|| "provider unavailable".to_string()),
            )),
            Err(e) => checks.push(CheckResult::fail("embed_provider", e.to_string())),
        },
        Err(e) => checks.push(CheckResult::fail("embed_provider", e.to_string())),
    }

    let all_ok = checks.iter().all(|c| c.ok);

    if args.json {
        let payload = serde_json::json!({ "healthy": all_ok, "checks": checks });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("claudemem doctor\n=================\n");
        for check in &checks {
            println!("[{}] {}: {}", if check.ok { "ok" } else { "FAIL" }, check.name, check.detail);
        }
        println!("\n{}", if all_ok { "all checks passed" } else { "one or more checks failed" });
    }

    Ok(())
}
