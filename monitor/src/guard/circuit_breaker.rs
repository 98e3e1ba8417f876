//! Circuit breaker protecting the monitor from a failing upstream.
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     failure_count >= failure_threshold
//! Open     → HalfOpen: recovery_timeout elapsed since the last failure (checked in can_execute)
//! HalfOpen → Closed:   success_count >= success_threshold
//! HalfOpen → Open:     any failure
//! ```
//!
//! One instance is shared by every endpoint; all state sits behind a single mutex.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{info, warn};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass
    Closed,
    /// Calls rejected until the recovery timeout elapses
    Open,
    /// Trial calls pass
    HalfOpen,
}

impl CircuitState {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures that trip Closed → Open
    pub failure_threshold: u32,
    /// Successes needed in HalfOpen to close
    pub success_threshold: u32,
    /// Time the breaker stays open after the last failure
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Snapshot for logging and the status command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    /// Current state
    pub state: CircuitState,
    /// Failures counted toward tripping
    pub failure_count: u32,
    /// Successes counted in HalfOpen
    pub success_count: u32,
    /// Wall-clock time of the last failure
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Wall-clock time of the last success
    pub last_success_time: Option<DateTime<Utc>>,
    /// Outcomes recorded since start
    pub total_requests: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
    last_success_time: Option<DateTime<Utc>>,
    total_requests: u64,
}

/// Three-state failure isolation machine
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
                last_failure_time: None,
                last_success_time: None,
                total_requests: 0,
            }),
        }
    }

    /// Thresholds in use.
    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Returns whether a call may go through. Moves Open → HalfOpen once the
    /// recovery timeout has elapsed.
    pub fn can_execute(&self) -> bool {
        self.can_execute_at(Instant::now())
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_requests += 1;
        inner.last_success_time = Some(Utc::now());
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    info!("Circuit breaker closed after successful trial calls");
                }
            }
            CircuitState::Closed => {
                // only consecutive failures trip the breaker
                inner.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// Current state without side effects.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.lock();
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            total_requests: inner.total_requests,
        }
    }

    pub(crate) fn can_execute_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);
                if elapsed > self.config.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    info!("Circuit breaker half-open, allowing trial calls");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub(crate) fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.total_requests += 1;
        inner.failure_count += 1;
        inner.last_failure_at = Some(now);
        inner.last_failure_time = Some(Utc::now());
        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        failures = inner.failure_count,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                warn!("Circuit breaker re-opened by a failed trial call");
            }
            CircuitState::Open => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
