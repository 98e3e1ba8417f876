//! 指数バックオフ付きリトライ
//!
//! 遅延は `base * factor^(attempt-1)` を `max_delay` で頭打ちにし、
//! [0.5, 1.0] の一様乱数を掛けて同時再試行の集中を避ける。

use rand::RngExt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound before jitter
    pub max_delay: Duration,
    /// Growth per attempt
    pub factor: f64,
    /// Apply the random multiplier
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt `attempt` (1-based), scaled
    /// by `multiplier` (clamped to [0.5, 1.0]).
    pub fn delay_with_multiplier(&self, attempt: u32, multiplier: f64) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let raw = self.base_delay.as_secs_f64() * self.factor.max(1.0).powi(exp);
        let capped = raw.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped * multiplier.clamp(0.5, 1.0))
    }

    /// Delay with a fresh random multiplier.
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = if self.jitter {
            rand::rng().random_range(0.5..=1.0)
        } else {
            1.0
        };
        self.delay_with_multiplier(attempt, multiplier)
    }

    /// Run `op` until it succeeds or attempts run out; the last error is returned.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_with_multiplier(1, 1.0), Duration::from_secs(1));
        assert_eq!(policy.delay_with_multiplier(2, 1.0), Duration::from_secs(2));
        assert_eq!(policy.delay_with_multiplier(3, 1.0), Duration::from_secs(4));
        assert_eq!(policy.delay_with_multiplier(10, 1.0), Duration::from_secs(30));
        assert_eq!(policy.delay_with_multiplier(100, 1.0), Duration::from_secs(30));
    }

    #[test]
    fn test_multiplier_is_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_with_multiplier(2, 0.1), Duration::from_secs(1));
        assert_eq!(policy.delay_with_multiplier(2, 3.0), Duration::from_secs(2));
    }

    #[test]
    fn test_jittered_delay_stays_in_range() {
        let policy = RetryPolicy::default();
        for attempt in 1..6 {
            let ceiling = policy.delay_with_multiplier(attempt, 1.0);
            let floor = policy.delay_with_multiplier(attempt, 0.5);
            for _ in 0..50 {
                let d = policy.delay(attempt);
                assert!(d >= floor && d <= ceiling, "{d:?} outside [{floor:?}, {ceiling:?}]");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = RetryPolicy::default()
            .run("op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("fail {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_last_error_when_exhausted() {
        let policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let result: Result<(), String> = policy
            .run("op", |attempt| async move { Err(format!("fail {attempt}")) })
            .await;
        assert_eq!(result, Err("fail 2".to_string()));
    }
}
