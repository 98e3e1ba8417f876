//! CLI module for oddsfeed-monitor
//!
//! Provides the command-line interface of the endpoint monitor.

pub mod check;
pub mod clear_cache;
pub mod run;
pub mod status;
pub mod test_endpoint;
pub mod validate;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

use crate::config::MonitorConfig;
use crate::discovery::{Discoverer, FileDiscoverer, NoopDiscoverer, StaticDiscoverer};
use crate::monitor::{EndpointMonitor, MonitorContext};

/// Odds feed endpoint monitor - keeps the upstream data-source list healthy
#[derive(Parser, Debug)]
#[command(name = "oddsfeed-monitor")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    ODDSFEED_DATA_DIR                 Config/cache/lock directory (default: ~/.oddsfeed)
    ODDSFEED_LOG_LEVEL                Log level (default: info)
    ODDSFEED_LOG_DIR                  Log file directory (default: <data dir>/logs)
    ODDSFEED_CHECK_INTERVAL_SECS      Endpoint reconciliation interval (default: 3600)
    ODDSFEED_PROBE_INTERVAL_SECS      Per-endpoint HEAD probe interval (default: 300)
    ODDSFEED_LOOP_TICK_SECS           Sleep between loop cycles (default: 300)
    ODDSFEED_ERROR_BACKOFF_SECS       Sleep after repeated failures (default: 600)
    ODDSFEED_RATE_LIMIT_MAX           Requests per window (default: 10)
    ODDSFEED_RATE_LIMIT_WINDOW_SECS   Rate limit window (default: 60)
    ODDSFEED_BREAKER_FAILURES         Failures before the breaker opens (default: 5)
    ODDSFEED_BREAKER_SUCCESSES        Half-open successes to close (default: 2)
    ODDSFEED_BREAKER_RECOVERY_SECS    Open duration (default: 60)
    ODDSFEED_PROBE_FAILURE_POLICY     assume_changed | assume_unchanged
    ODDSFEED_SEED_URLS                Seeds for the discoverer
    ODDSFEED_CANDIDATES_FILE          Candidate list written by the traffic sniffer
    ODDSFEED_CANDIDATES               Fixed candidate URLs (comma separated)
"#)]
pub struct Cli {
    /// Options shared by every subcommand
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Data directory (config, endpoint cache, lock)
    #[arg(long, global = true, env = "ODDSFEED_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Fixed candidate URLs for discovery (takes precedence over the candidates file)
    #[arg(
        long = "candidate",
        global = true,
        env = "ODDSFEED_CANDIDATES",
        value_delimiter = ','
    )]
    pub candidates: Vec<String>,
}

impl GlobalArgs {
    /// Apply the flags on top of the environment-derived config.
    pub fn apply(&self, mut config: MonitorConfig) -> MonitorConfig {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        config
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monitor loop until Ctrl-C / SIGTERM
    Run(run::RunArgs),
    /// Reconcile the endpoint list once
    Check(check::CheckArgs),
    /// Test one endpoint and print the result
    Test(test_endpoint::TestArgs),
    /// Validate a payload file
    Validate(validate::ValidateArgs),
    /// Show the persisted config, endpoint cache and lock holder
    Status(status::StatusArgs),
    /// Evict the endpoint-state cache
    ClearCache(clear_cache::ClearCacheArgs),
}

/// Pick the discoverer: fixed candidates, then the sniffer file, then none.
pub fn build_discoverer(global: &GlobalArgs, config: &MonitorConfig) -> Arc<dyn Discoverer> {
    if !global.candidates.is_empty() {
        debug!(count = global.candidates.len(), "Using fixed candidate list");
        return Arc::new(StaticDiscoverer::new(global.candidates.iter().cloned()));
    }
    match &config.candidates_file {
        Some(path) => {
            debug!(path = %path.display(), "Using candidates file");
            Arc::new(FileDiscoverer::new(path.clone()))
        }
        None => Arc::new(NoopDiscoverer),
    }
}

/// Build a monitor for one-shot or long-running use.
pub fn build_monitor(
    global: &GlobalArgs,
    config: MonitorConfig,
) -> anyhow::Result<EndpointMonitor> {
    let discoverer = build_discoverer(global, &config);
    let ctx = MonitorContext::new(config)?;
    Ok(EndpointMonitor::new(ctx, discoverer))
}

/// Execute the parsed command. `config` already carries the global flags.
pub async fn dispatch(cli: Cli, config: MonitorConfig) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Run(args) => run::execute(args, &cli.global, config).await,
        Commands::Check(args) => check::execute(args, &cli.global, config).await,
        Commands::Test(args) => test_endpoint::execute(args, &cli.global, config).await,
        Commands::Validate(args) => validate::execute(args),
        Commands::Status(args) => status::execute(args, &config),
        Commands::ClearCache(args) => clear_cache::execute(args, &config),
    }
}
