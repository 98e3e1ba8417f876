//! test subcommand
//!
//! Runs one endpoint test and prints the result as JSON.

use clap::Args;
use std::process::ExitCode;

use super::{build_monitor, GlobalArgs};
use crate::config::MonitorConfig;

/// Arguments for the test subcommand
#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// Endpoint URL to test
    pub url: String,
}

/// Execute the test command. Exits with failure when the endpoint is unavailable.
pub async fn execute(
    args: &TestArgs,
    global: &GlobalArgs,
    config: MonitorConfig,
) -> anyhow::Result<ExitCode> {
    let monitor = build_monitor(global, config)?;
    let result = monitor.test_endpoint(&args.url).await;
    monitor.context().persist_cache()?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.available {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
