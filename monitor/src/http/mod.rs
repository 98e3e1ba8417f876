//! Upstream HTTP access.
//!
//! One pooled `reqwest::Client` is shared by the prober and the fetcher. The
//! browser-like header set is fixed and attached as default headers; the
//! per-request timeouts differ (HEAD short, GET long).

pub mod fetcher;
pub mod prober;

use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::common::MonitorError;
pub use fetcher::{ConditionalFetcher, FetchResponse};
pub use prober::{ProbeFailurePolicy, Prober};

/// Browser User-Agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT: &str = "application/json, text/plain, */*";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7";
const ORIGIN: &str = "https://bc.game";
const REFERER: &str = "https://bc.game/sport";

/// HEAD probe timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Full GET timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Header set attached to every upstream request.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE),
    );
    headers.insert(header::ORIGIN, HeaderValue::from_static(ORIGIN));
    headers.insert(header::REFERER, HeaderValue::from_static(REFERER));
    headers
}

/// Build the shared client.
pub fn build_client() -> Result<reqwest::Client, MonitorError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(default_headers())
        .pool_idle_timeout(Duration::from_secs(120))
        .connect_timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| MonitorError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Header value as an owned string, if present and visible ASCII.
pub(crate) fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
