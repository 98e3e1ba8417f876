//! HEADによる軽量な変更検知（サイドプローブ）
//!
//! ETag・Last-Modified・Content-Length・ステータスから指紋を作り、
//! キャッシュ済みの指紋と比較する。ゲート（ブレーカー・レート制限）は
//! 呼び出し側が適用する。

use reqwest::{header, Client};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{header_str, PROBE_TIMEOUT};
use crate::common::MonitorError;
use crate::store::EndpointStateCache;
use crate::types::ProbeResult;

/// How a failed probe is reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbeFailurePolicy {
    /// Report `has_changes = true` so the caller re-fetches and re-validates
    #[default]
    AssumeChanged,
    /// Report `has_changes = false` so a cached result keeps being served
    AssumeUnchanged,
}

impl ProbeFailurePolicy {
    /// Config value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssumeChanged => "assume_changed",
            Self::AssumeUnchanged => "assume_unchanged",
        }
    }
}

impl std::fmt::Display for ProbeFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "assume_changed" | "changed" => Ok(Self::AssumeChanged),
            "assume_unchanged" | "unchanged" => Ok(Self::AssumeUnchanged),
            other => Err(format!("unknown probe failure policy: {other}")),
        }
    }
}

/// Fingerprint over the HEAD metadata.
pub fn fingerprint(
    etag: Option<&str>,
    last_modified: Option<&str>,
    content_length: Option<&str>,
    status: u16,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(etag.unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(last_modified.unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(content_length.unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(status.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// HEAD-based change detector
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    cache: EndpointStateCache,
    timeout: Duration,
    policy: ProbeFailurePolicy,
}

impl Prober {
    /// Prober using the default 5s timeout.
    pub fn new(client: Client, cache: EndpointStateCache, policy: ProbeFailurePolicy) -> Self {
        Self {
            client,
            cache,
            timeout: PROBE_TIMEOUT,
            policy,
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Failure policy in use.
    pub fn policy(&self) -> ProbeFailurePolicy {
        self.policy
    }

    /// Issue a HEAD request and compare its fingerprint with the cached one.
    ///
    /// Never fails: transport errors and error statuses are reported through
    /// `ProbeResult::error` with `has_changes` set by the failure policy.
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let start = Instant::now();
        debug!(url, "HTTP HEAD start");

        let resp = match self.client.head(url).timeout(self.timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let err = MonitorError::from_reqwest(&e);
                warn!(url, error = %err, "HTTP HEAD failed");
                return self.failed(url, None, start, &err);
            }
        };

        let status = resp.status().as_u16();
        if resp.status().is_client_error() || resp.status().is_server_error() {
            let err = MonitorError::Status(status);
            warn!(url, status, "HEAD returned error status");
            return self.failed(url, Some(status), start, &err);
        }

        let headers = resp.headers();
        let etag = header_str(headers, header::ETAG);
        let last_modified = header_str(headers, header::LAST_MODIFIED);
        let content_length = header_str(headers, header::CONTENT_LENGTH);
        let hash = fingerprint(
            etag.as_deref(),
            last_modified.as_deref(),
            content_length.as_deref(),
            status,
        );

        let previous = self.cache.get(url).and_then(|s| s.content_hash);
        let has_changes = previous.as_deref() != Some(hash.as_str());

        let now = chrono::Utc::now();
        let stored = hash.clone();
        self.cache.update(url, |state| {
            state.content_hash = Some(stored);
            state.last_probe = Some(now);
        });

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(url, status, has_changes, latency_ms, "HTTP HEAD done");

        ProbeResult {
            url: url.to_string(),
            has_changes,
            etag,
            last_modified,
            content_hash: Some(hash),
            status: Some(status),
            latency_ms,
            error: None,
        }
    }

    fn failed(
        &self,
        url: &str,
        status: Option<u16>,
        start: Instant,
        err: &MonitorError,
    ) -> ProbeResult {
        ProbeResult {
            url: url.to_string(),
            has_changes: self.policy == ProbeFailurePolicy::AssumeChanged,
            etag: None,
            last_modified: None,
            content_hash: None,
            status,
            latency_ms: start.elapsed().as_millis() as u64,
            error: Some(format!("{}: {}", err.kind(), err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_depends_on_every_field() {
        let base = fingerprint(Some("\"a\""), Some("Mon"), Some("10"), 200);
        assert_eq!(base, fingerprint(Some("\"a\""), Some("Mon"), Some("10"), 200));
        assert_ne!(base, fingerprint(Some("\"b\""), Some("Mon"), Some("10"), 200));
        assert_ne!(base, fingerprint(Some("\"a\""), Some("Tue"), Some("10"), 200));
        assert_ne!(base, fingerprint(Some("\"a\""), Some("Mon"), Some("11"), 200));
        assert_ne!(base, fingerprint(Some("\"a\""), Some("Mon"), Some("10"), 203));
        assert_eq!(base.len(), 64);
    }

    #[test]
    fn test_fingerprint_fields_do_not_bleed() {
        assert_ne!(
            fingerprint(Some("ab"), Some("c"), None, 200),
            fingerprint(Some("a"), Some("bc"), None, 200)
        );
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "assume_unchanged".parse::<ProbeFailurePolicy>().unwrap(),
            ProbeFailurePolicy::AssumeUnchanged
        );
        assert_eq!(
            "Assume-Changed".parse::<ProbeFailurePolicy>().unwrap(),
            ProbeFailurePolicy::AssumeChanged
        );
        assert!("maybe".parse::<ProbeFailurePolicy>().is_err());
        assert_eq!(ProbeFailurePolicy::default().to_string(), "assume_changed");
    }

    #[tokio::test]
    async fn test_unreachable_host_follows_policy() {
        let cache = EndpointStateCache::new();
        // Port 9 on localhost is the discard port; nothing listens there in CI.
        let url = "http://127.0.0.1:9/api/odds";

        let prober = Prober::new(Client::new(), cache.clone(), ProbeFailurePolicy::AssumeChanged)
            .with_timeout(Duration::from_secs(2));
        let result = prober.probe(url).await;
        assert!(result.is_failure());
        assert!(result.has_changes);
        assert!(result.status.is_none());

        let prober = Prober::new(Client::new(), cache.clone(), ProbeFailurePolicy::AssumeUnchanged)
            .with_timeout(Duration::from_secs(2));
        assert!(!prober.probe(url).await.has_changes);
        assert!(cache.get(url).is_none(), "failed probes leave the cache untouched");
    }
}
