//! status subcommand
//!
//! Displays the persisted endpoint config, the endpoint-state cache and the
//! running monitor (if any).

use clap::Args;
use std::process::ExitCode;

use crate::config::MonitorConfig;
use crate::lock::current_holder;
use crate::store::{EndpointStore, StateCacheFile};

/// Arguments for the status subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Print the full config as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// One table row per cached endpoint.
pub fn cache_rows(cache: &StateCacheFile) -> Vec<String> {
    cache
        .endpoint_cache
        .iter()
        .map(|(url, state)| {
            let last_probe = state
                .last_probe
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            let result = match &state.test_result {
                Some(r) if r.available => format!("OK ({})", r.status_code),
                Some(r) => format!("FAIL ({})", r.status_code),
                None => "-".to_string(),
            };
            format!("{url}\t{last_probe}\t{result}")
        })
        .collect()
}

/// Execute the status command
pub fn execute(args: &StatusArgs, config: &MonitorConfig) -> anyhow::Result<ExitCode> {
    let store = EndpointStore::new(&config.data_dir);
    let endpoints = store.load();

    match current_holder(&config.data_dir) {
        Some(info) => println!("Monitor running (PID: {}, started: {})", info.pid, info.started_at),
        None => println!("No monitor running for {}", config.data_dir.display()),
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&endpoints)?);
    } else {
        println!(
            "Endpoints: {} ({}, updated: {})",
            endpoints.endpoints.len(),
            endpoints.discovery_method,
            endpoints
                .last_updated
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );
        for url in &endpoints.endpoints {
            println!("  {url}");
        }
    }

    let cache = store.load_state_cache();
    println!("Endpoint cache: {} entries", cache.endpoint_cache.len());
    let rows = cache_rows(&cache);
    if !rows.is_empty() {
        println!("URL\tLAST PROBE\tRESULT");
        for row in rows {
            println!("{row}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
