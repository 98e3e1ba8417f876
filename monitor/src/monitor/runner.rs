//! 定期監視ループ
//!
//! 各サイクル: 期限が来ていれば `check_and_update`（リトライ付き）、
//! プローブ期限切れのエンドポイントを HEAD、状態キャッシュを保存、統計をログ。
//! 連続失敗が閾値に達したら通常間隔の代わりにエラーバックオフで待機する。

use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::{EndpointMonitor, ProbeSweep, RetryPolicy};
use crate::common::MonitorError;
use crate::config::MonitorConfig;
use crate::shutdown::ShutdownController;

/// Cadence of the run loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    /// Minimum time between two successful `check_and_update` runs
    pub check_interval: Duration,
    /// Sleep between cycles
    pub tick: Duration,
    /// Sleep once `max_consecutive_failures` cycles in a row have failed
    pub error_backoff: Duration,
    /// Failed cycles before switching to `error_backoff`
    pub max_consecutive_failures: u32,
    /// Retry schedule for `check_and_update` within one cycle
    pub retry: RetryPolicy,
}

impl LoopSettings {
    /// Settings derived from the monitor config.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            check_interval: config.check_interval,
            tick: config.loop_tick,
            error_backoff: config.error_backoff,
            max_consecutive_failures: 3,
            retry: RetryPolicy::default(),
        }
    }

    /// Sleep before the next cycle given the current failure streak.
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures >= self.max_consecutive_failures.max(1) {
            self.error_backoff
        } else {
            self.tick
        }
    }
}

/// What the loop did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Cycles started
    pub cycles: u64,
    /// Cycles whose reconciliation failed after all retries
    pub failed_cycles: u64,
    /// Successful `check_and_update` runs that changed the endpoint list
    pub updates: u64,
}

impl EndpointMonitor {
    /// Run until `shutdown` is requested. Failures never end the loop.
    pub async fn run_loop(
        &self,
        settings: LoopSettings,
        shutdown: ShutdownController,
    ) -> LoopSummary {
        let mut summary = LoopSummary::default();
        let mut last_check: Option<Instant> = None;
        let mut consecutive_failures = 0u32;

        info!(
            check_interval_secs = settings.check_interval.as_secs(),
            tick_secs = settings.tick.as_secs(),
            probe_interval_secs = self.ctx.config.probe_interval.as_secs(),
            policy = %self.probe_failure_policy(),
            "Monitor loop started"
        );

        while !shutdown.is_shutdown_requested() {
            summary.cycles += 1;
            let outcome = tokio::select! {
                outcome = self.run_cycle(&settings, &mut last_check) => outcome,
                _ = shutdown.wait() => break,
            };

            match outcome {
                Ok(changed) => {
                    consecutive_failures = 0;
                    if changed {
                        summary.updates += 1;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    summary.failed_cycles += 1;
                    error!(
                        error = %e,
                        kind = e.kind(),
                        consecutive_failures,
                        "Monitor cycle failed"
                    );
                }
            }

            let delay = settings.next_delay(consecutive_failures);
            if consecutive_failures >= settings.max_consecutive_failures.max(1) {
                warn!(
                    backoff_secs = delay.as_secs(),
                    consecutive_failures,
                    "Too many consecutive failures, backing off"
                );
            }
            if !shutdown.sleep(delay).await {
                break;
            }
        }

        if let Err(e) = self.ctx.persist_cache() {
            warn!(error = %e, "Failed to persist endpoint cache on shutdown");
        }
        info!(
            cycles = summary.cycles,
            failed_cycles = summary.failed_cycles,
            updates = summary.updates,
            "Monitor loop stopped"
        );
        summary
    }

    /// One cycle. Returns whether the endpoint list changed.
    async fn run_cycle(
        &self,
        settings: &LoopSettings,
        last_check: &mut Option<Instant>,
    ) -> Result<bool, MonitorError> {
        let due = last_check.map_or(true, |at| at.elapsed() >= settings.check_interval);
        let outcome = if due {
            let outcome = settings
                .retry
                .run("check_and_update", |_| self.check_and_update())
                .await;
            match &outcome {
                Ok(_) => *last_check = Some(Instant::now()),
                Err(e) => warn!(error = %e, "Reconciliation failed, continuing with the probe sweep"),
            }
            outcome
        } else {
            Ok(false)
        };

        // The sweep and the cache save run whether or not reconciliation worked.
        let sweep = self.probe_due_endpoints().await;
        if let Err(e) = self.ctx.persist_cache() {
            warn!(error = %e, "Failed to persist endpoint cache");
        }
        self.log_cycle_stats(&sweep);
        outcome
    }

    fn log_cycle_stats(&self, sweep: &ProbeSweep) {
        let breaker = self.ctx.breaker.stats();
        let stats = self.ctx.stats.snapshot();
        info!(
            probed = sweep.probed,
            changed = sweep.changed,
            failed = sweep.failed,
            denied = sweep.denied,
            breaker_state = breaker.state.as_str(),
            breaker_failures = breaker.failure_count,
            breaker_total = breaker.total_requests,
            total_probes = stats.probes,
            cache_hits = stats.cache_hits,
            fetches = stats.fetches,
            not_modified = stats.not_modified,
            validation_failures = stats.validation_failures,
            rate_window = self.ctx.limiter.in_window(),
            "Monitor cycle complete"
        );
    }
}
