//! プローブ・テスト結果の型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ValidationVerdict;
use crate::common::MonitorError;

/// Result of a HEAD side probe. Produced per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Probed URL
    pub url: String,
    /// True when the fingerprint differs from the cached one (or the probe failed
    /// under the assume-changed policy)
    pub has_changes: bool,
    /// ETag header of the HEAD response
    pub etag: Option<String>,
    /// Last-Modified header of the HEAD response
    pub last_modified: Option<String>,
    /// Fingerprint over ETag, Last-Modified, Content-Length and status
    pub content_hash: Option<String>,
    /// HTTP status (None on transport failure)
    pub status: Option<u16>,
    /// Round-trip latency
    pub latency_ms: u64,
    /// Failure description
    pub error: Option<String>,
}

impl ProbeResult {
    /// Returns true when the HEAD request did not produce a usable answer.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of `EndpointMonitor::test_endpoint`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    /// Tested URL
    #[serde(rename = "endpoint")]
    pub url: String,
    /// HTTP status of the decisive response (0 when no response)
    pub status_code: u16,
    /// Reachable and payload valid
    pub available: bool,
    /// Body size in bytes
    pub response_size: usize,
    /// Content-Type of the payload
    #[serde(default)]
    pub content_type: String,
    /// Validation verdict (None when no payload was inspected)
    #[serde(default)]
    pub validation: Option<ValidationVerdict>,
    /// SHA-256 of the raw body
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Served from the endpoint-state cache without a fetch
    #[serde(default)]
    pub from_cache: bool,
    /// Reason the endpoint is unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the result was produced
    pub test_time: DateTime<Utc>,
}

impl TestResult {
    /// Unavailable result carrying `err`. Used for local denials and transport failures.
    pub fn unavailable(url: &str, err: &MonitorError) -> Self {
        Self {
            url: url.to_string(),
            status_code: match err {
                MonitorError::Status(code) => *code,
                _ => 0,
            },
            available: false,
            response_size: 0,
            content_type: String::new(),
            validation: None,
            content_hash: None,
            from_cache: false,
            error: Some(format!("{}: {}", err.kind(), err)),
            test_time: Utc::now(),
        }
    }

    /// Returns true when a payload was inspected and passed validation.
    pub fn validation_passed(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.is_valid)
    }

    /// Returns true when the call never left the process (breaker or limiter denial).
    pub fn denied_locally(&self) -> bool {
        let Some(error) = self.error.as_deref() else {
            return false;
        };
        [
            MonitorError::CircuitOpen.kind(),
            MonitorError::RateLimited(Default::default()).kind(),
        ]
        .iter()
        .any(|kind| error.strip_prefix(kind).is_some_and(|rest| rest.starts_with(':')))
    }
}
