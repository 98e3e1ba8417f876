//! 条件付きGET
//!
//! `If-None-Match` / `If-Modified-Since` は直前のプローブ結果を優先し、
//! 無ければキャッシュ済みの値を使う。200 で検証子を保存し、304 は本文なしの成功。

use reqwest::{header, Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{header_str, FETCH_TIMEOUT};
use crate::common::MonitorError;
use crate::store::EndpointStateCache;
use crate::types::ProbeResult;

/// Successful GET outcome (200 or 304)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// 200 or 304
    pub status: u16,
    /// Raw body; None on 304
    pub body: Option<Vec<u8>>,
    /// Content-Type header
    pub content_type: Option<String>,
    /// ETag header
    pub etag: Option<String>,
    /// Last-Modified header
    pub last_modified: Option<String>,
    /// Round-trip latency including the body read
    pub latency_ms: u64,
}

impl FetchResponse {
    /// Returns true for 304 Not Modified.
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED.as_u16()
    }
}

/// Full GET with conditional headers
#[derive(Debug, Clone)]
pub struct ConditionalFetcher {
    client: Client,
    cache: EndpointStateCache,
    timeout: Duration,
}

impl ConditionalFetcher {
    /// Fetcher using the default 15s timeout.
    pub fn new(client: Client, cache: EndpointStateCache) -> Self {
        Self {
            client,
            cache,
            timeout: FETCH_TIMEOUT,
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Conditional GET. Validators come from `probe` when it carries them,
    /// otherwise from the endpoint-state cache.
    pub async fn fetch(
        &self,
        url: &str,
        probe: Option<&ProbeResult>,
    ) -> Result<FetchResponse, MonitorError> {
        let cached = self.cache.get(url).unwrap_or_default();
        let etag = probe.and_then(|p| p.etag.clone()).or(cached.etag);
        let last_modified = probe
            .and_then(|p| p.last_modified.clone())
            .or(cached.last_modified);

        let mut request = self.client.get(url).timeout(self.timeout);
        if let Some(etag) = &etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &last_modified {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }
        self.send(url, request).await
    }

    /// Plain GET without validators.
    pub async fn fetch_unconditional(&self, url: &str) -> Result<FetchResponse, MonitorError> {
        let request = self.client.get(url).timeout(self.timeout);
        self.send(url, request).await
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<FetchResponse, MonitorError> {
        let start = Instant::now();
        debug!(url, "HTTP GET start");

        let resp = request.send().await.map_err(|e| {
            let err = MonitorError::from_reqwest(&e);
            warn!(url, error = %err, "HTTP GET failed");
            err
        })?;

        let status = resp.status();
        let headers = resp.headers();
        let etag = header_str(headers, header::ETAG);
        let last_modified = header_str(headers, header::LAST_MODIFIED);
        let content_type = header_str(headers, header::CONTENT_TYPE);

        match status {
            StatusCode::OK => {
                let body = resp.bytes().await.map_err(|e| {
                    let err = MonitorError::from_reqwest(&e);
                    warn!(url, error = %err, "Failed reading body");
                    err
                })?;
                let now = chrono::Utc::now();
                let (stored_etag, stored_lm) = (etag.clone(), last_modified.clone());
                self.cache.update(url, |state| {
                    state.etag = stored_etag;
                    state.last_modified = stored_lm;
                    state.last_fetch = Some(now);
                });
                let latency_ms = start.elapsed().as_millis() as u64;
                debug!(url, bytes = body.len(), latency_ms, "HTTP GET 200");
                Ok(FetchResponse {
                    status: status.as_u16(),
                    body: Some(body.to_vec()),
                    content_type,
                    etag,
                    last_modified,
                    latency_ms,
                })
            }
            StatusCode::NOT_MODIFIED => {
                let latency_ms = start.elapsed().as_millis() as u64;
                debug!(url, latency_ms, "HTTP GET 304");
                Ok(FetchResponse {
                    status: status.as_u16(),
                    body: None,
                    content_type,
                    etag,
                    last_modified,
                    latency_ms,
                })
            }
            other => {
                warn!(url, status = other.as_u16(), "HTTP GET unexpected status");
                Err(MonitorError::Status(other.as_u16()))
            }
        }
    }
}
