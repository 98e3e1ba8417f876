//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! `MonitorError::kind()` returns a stable reason tag so callers of
//! `test_endpoint` can tell "upstream is down" apart from "we are
//! self-throttling" without matching on message text.

use std::time::Duration;
use thiserror::Error;

/// Persistence layer error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Endpoint monitor error type
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Transport-level HTTP failure (connect, TLS, body read)
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Request exceeded its timeout
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Upstream answered with a status we do not accept
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    /// Local rate limiter denied the call
    #[error("Rate limited: retry in {}ms", .0.as_millis())]
    RateLimited(Duration),

    /// Circuit breaker is open
    #[error("Circuit breaker open")]
    CircuitOpen,

    /// Payload failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Discoverer failure
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Stable reason tag for logs and `TestResult::error`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "network_error",
            Self::Timeout(_) => "timeout_error",
            Self::Status(_) => "http_status_error",
            Self::RateLimited(_) => "rate_limited",
            Self::CircuitOpen => "circuit_open",
            Self::Validation(_) => "validation_error",
            Self::Store(_) => "store_error",
            Self::Discovery(_) => "discovery_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Returns true for denials decided locally before any network call.
    pub fn is_local_denial(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::CircuitOpen)
    }

    /// Maps a reqwest error onto the timeout / transport split.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}
