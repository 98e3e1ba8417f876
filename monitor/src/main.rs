//! Odds feed endpoint monitor entry point

use clap::Parser;
use oddsfeed_monitor::cli::{self, Cli, Commands};
use oddsfeed_monitor::config::MonitorConfig;
use oddsfeed_monitor::logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.global.apply(MonitorConfig::from_env());

    // File logging only for the long-running loop; one-shot commands log to stderr.
    let log_dir = matches!(cli.command, Commands::Run(_)).then(|| config.log_dir());
    let _log_guard = match logging::init(log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli::dispatch(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
