//! ログ初期化
//!
//! stderr への fmt 出力（stdout はコマンドの JSON 出力用）に加え、ログディレクトリが
//! 使える場合は日次ローテーションのファイル出力を重ねる。レベルは `ODDSFEED_LOG_LEVEL`（旧: `LOG_LEVEL`）、
//! `RUST_LOG` が設定されていればそちらが優先。

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::get_env_with_fallback_or;

/// Prefix of the daily log files.
pub const LOG_FILE_PREFIX: &str = "oddsfeed-monitor.log";

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    format!("{level},oddsfeed_monitor={level},hyper=warn,reqwest=warn")
}

fn build_filter() -> EnvFilter {
    let level = get_env_with_fallback_or("ODDSFEED_LOG_LEVEL", "LOG_LEVEL", "info");
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(&level)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialise the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process. `None` means logging goes to stderr only.
pub fn init(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let file = log_dir.and_then(|dir| match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            Some(tracing_appender::non_blocking(appender))
        }
        Err(e) => {
            eprintln!("Log directory {} unavailable: {}", dir.display(), e);
            None
        }
    });

    match file {
        Some((writer, guard)) => {
            tracing_subscriber::registry()
                .with(build_filter())
                .with(console_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(build_filter())
                .with(console_layer)
                .try_init()?;
            Ok(None)
        }
    }
}
