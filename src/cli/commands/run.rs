//! Run command - execute a playbook
//!
//! Transports are not part of this crate, so the launcher drives the
//! playbook through the dry-run runner and prints a recap.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use choreo::callback::TracingSink;
use choreo::executor::playbook::Playbook;
use choreo::executor::task::TaskResult;
use choreo::executor::Executor;
use choreo::inventory::StaticInventory;
use choreo::roles::Role;
use choreo::runner::DryRunner;
use clap::Parser;
use tracing::info;

use super::{parse_extra_vars, CommandContext};

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the playbook file
    #[arg(required = true)]
    pub playbook: PathBuf,

    /// Path to the inventory file
    #[arg(short = 'i', long, env = "CHOREO_INVENTORY")]
    pub inventory: PathBuf,

    /// Role definitions available to plays
    #[arg(short = 'r', long)]
    pub roles: Option<PathBuf>,

    /// Extra variables (key=value or @file.yml)
    #[arg(short = 'e', long = "extra-vars", action = clap::ArgAction::Append)]
    pub extra_vars: Vec<String>,

    /// Tags to run (only tasks with these tags)
    #[arg(long, short = 't', action = clap::ArgAction::Append)]
    pub tags: Vec<String>,

    /// Tags to skip (skip tasks with these tags)
    #[arg(long, action = clap::ArgAction::Append)]
    pub skip_tags: Vec<String>,

    /// Ask the runner not to make changes
    #[arg(long = "check")]
    pub check_mode: bool,
}

#[derive(Debug, Default)]
struct HostRecap {
    ok: usize,
    changed: usize,
    failed: usize,
    ignored: usize,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let playbook = Playbook::load(&self.playbook)
            .with_context(|| format!("Failed to load playbook: {}", self.playbook.display()))?;
        let inventory = StaticInventory::load(&self.inventory)?;
        let extra_vars = parse_extra_vars(&self.extra_vars)?;
        let roles = match &self.roles {
            Some(path) => Role::load_all(path)
                .with_context(|| format!("Failed to load roles: {}", path.display()))?,
            None => Vec::new(),
        };

        let mut config = ctx.config.executor_config();
        config.tags.extend(self.tags.iter().cloned());
        config.skip_tags.extend(self.skip_tags.iter().cloned());
        config.check_mode |= self.check_mode;

        info!(
            "Running playbook '{}' against {} hosts",
            playbook.name,
            inventory.host_count()
        );

        let executor = Executor::new(Arc::new(inventory), Arc::new(DryRunner::new()))
            .with_config(config)
            .with_roles(roles)
            .with_sink(Arc::new(TracingSink));

        let cancel = executor.cancellation_token();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let outcome = executor.execute(&playbook, &extra_vars).await;
        ctrl_c.abort();

        match outcome {
            Ok(results) => {
                print_recap(&results, ctx.verbosity);
                Ok(0)
            }
            Err(failure) => {
                print_recap(&failure.results, ctx.verbosity);
                eprintln!("ERROR: {}", failure);
                Ok(failure.error.exit_code())
            }
        }
    }
}

fn print_recap(results: &[TaskResult], verbosity: u8) {
    let mut recap: BTreeMap<&str, HostRecap> = BTreeMap::new();

    for result in results {
        if verbosity > 0 {
            let status = match (result.success, result.changed, result.ignored) {
                (true, true, _) => "changed",
                (true, false, _) => "ok",
                (false, _, true) => "failed (ignored)",
                (false, _, false) => "failed",
            };
            println!("{}: [{}] {}", status, result.host, result.task);
        }

        let entry = recap.entry(result.host.as_str()).or_default();
        match (result.success, result.ignored) {
            (true, _) if result.changed => entry.changed += 1,
            (true, _) => entry.ok += 1,
            (false, true) => entry.ignored += 1,
            (false, false) => entry.failed += 1,
        }
    }

    println!("\nPLAY RECAP");
    for (host, stats) in recap {
        println!(
            "{:<24} ok={:<4} changed={:<4} failed={:<4} ignored={}",
            host, stats.ok, stats.changed, stats.failed, stats.ignored
        );
    }
}
