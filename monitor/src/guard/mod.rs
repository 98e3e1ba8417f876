//! 障害隔離・流量制御
//!
//! Both gates are checked by the monitor before any network call.

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use rate_limiter::RateLimiter;
