//! run サブコマンド
//!
//! 監視ループを起動し、Ctrl-C / SIGTERM で終了する。

use clap::Args;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use super::{build_monitor, GlobalArgs};
use crate::config::MonitorConfig;
use crate::lock::MonitorLock;
use crate::monitor::LoopSettings;
use crate::shutdown::ShutdownController;

/// run サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Endpoint reconciliation interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Per-endpoint HEAD probe interval in seconds
    #[arg(long)]
    pub probe_interval: Option<u64>,

    /// Sleep between loop cycles in seconds
    #[arg(long)]
    pub tick: Option<u64>,
}

impl RunArgs {
    /// Apply the flags on top of `config`.
    pub fn apply(&self, mut config: MonitorConfig) -> MonitorConfig {
        if let Some(secs) = self.interval {
            config.check_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.probe_interval {
            config.probe_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.tick {
            config.loop_tick = Duration::from_secs(secs);
        }
        config
    }
}

/// Execute the run command
pub async fn execute(
    args: &RunArgs,
    global: &GlobalArgs,
    config: MonitorConfig,
) -> anyhow::Result<ExitCode> {
    let config = args.apply(config);
    let lock = MonitorLock::acquire(&config.data_dir)?;
    info!(
        pid = lock.holder().pid,
        data_dir = %config.data_dir.display(),
        "Monitor lock acquired"
    );

    let settings = LoopSettings::from_config(&config);
    let monitor = build_monitor(global, config)?;

    let shutdown = ShutdownController::default();
    let signals = tokio::spawn(forward_signals(shutdown.clone()));
    let summary = monitor.run_loop(settings, shutdown).await;
    signals.abort();

    info!(cycles = summary.cycles, "Monitor stopped");
    lock.release()?;
    Ok(ExitCode::SUCCESS)
}

/// Request shutdown on Ctrl-C or SIGTERM.
async fn forward_signals(shutdown: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
    shutdown.request_shutdown();
}
