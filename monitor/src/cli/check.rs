//! check subcommand
//!
//! Runs one reconciliation and prints the resulting endpoint config.

use clap::Args;
use std::process::ExitCode;

use super::{build_monitor, GlobalArgs};
use crate::config::MonitorConfig;

/// Arguments for the check subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {}

/// Execute the check command
pub async fn execute(
    _args: &CheckArgs,
    global: &GlobalArgs,
    config: MonitorConfig,
) -> anyhow::Result<ExitCode> {
    let monitor = build_monitor(global, config)?;
    let outcome = monitor.check_and_update().await;
    // The cache is advisory; keep what was learned even if the save failed.
    monitor.context().persist_cache()?;
    let changed = outcome?;

    println!(
        "{}",
        if changed {
            "Endpoint list updated"
        } else {
            "Endpoint list unchanged"
        }
    );
    let current = monitor.context().store.load();
    println!("{}", serde_json::to_string_pretty(&current)?);
    Ok(ExitCode::SUCCESS)
}
