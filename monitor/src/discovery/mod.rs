//! 候補エンドポイントの発見
//!
//! 実際のトラフィック収集（ブラウザ自動化）は外部ツールが担う。ここでは
//! その出力を文字列リストとして受け取る `Discoverer` トレイトと、
//! API らしい URL だけを残すフィルタを提供する。

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::common::MonitorError;

/// Substrings that mark a URL as a likely data endpoint.
pub const API_INDICATORS: &[&str] = &[
    "/api/",
    "/cache/",
    "platform-sports",
    "live10",
    "prematch",
    "live",
    ".json",
];

/// Source of candidate endpoint URLs
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Propose candidate URLs. May take seconds.
    async fn discover_candidates(&self, seeds: &[String]) -> Result<Vec<String>, MonitorError>;
}

/// Never proposes anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiscoverer;

#[async_trait]
impl Discoverer for NoopDiscoverer {
    async fn discover_candidates(&self, _seeds: &[String]) -> Result<Vec<String>, MonitorError> {
        Ok(Vec::new())
    }
}

/// Fixed candidate list
#[derive(Debug, Clone, Default)]
pub struct StaticDiscoverer {
    candidates: Vec<String>,
}

impl StaticDiscoverer {
    /// Discoverer returning `candidates` on every call.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Discoverer for StaticDiscoverer {
    async fn discover_candidates(&self, _seeds: &[String]) -> Result<Vec<String>, MonitorError> {
        Ok(self.candidates.clone())
    }
}

/// Reads the newline-separated list an external sniffer writes.
///
/// Blank lines and `#` comments are skipped; a missing file is an empty list.
#[derive(Debug, Clone)]
pub struct FileDiscoverer {
    path: PathBuf,
}

impl FileDiscoverer {
    /// Discoverer reading `path` on every call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Discoverer for FileDiscoverer {
    async fn discover_candidates(&self, _seeds: &[String]) -> Result<Vec<String>, MonitorError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Candidates file not found");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(MonitorError::Discovery(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }
}

/// Keeps only URLs that look like data endpoints of the monitored site
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    host: Option<String>,
}

impl CandidateFilter {
    /// Filter requiring `host` to appear in every URL. An empty host disables
    /// the host check.
    pub fn new(host: impl Into<String>) -> Self {
        let host: String = host.into();
        let host = host.trim().to_ascii_lowercase();
        Self {
            host: (!host.is_empty()).then_some(host),
        }
    }

    /// Returns true if `url` belongs to the host and carries an API indicator.
    pub fn is_potential_api_url(&self, url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        if let Some(host) = &self.host {
            if !lower.contains(host.as_str()) {
                return false;
            }
        }
        API_INDICATORS.iter().any(|indicator| lower.contains(indicator))
    }

    /// Filtered candidates with duplicates removed, first occurrence kept.
    pub fn apply(&self, candidates: Vec<String>) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        candidates
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| self.is_potential_api_url(url))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}

/// Ask `discoverer` for candidates and filter them. Errors become an empty list.
pub async fn discover_filtered(
    discoverer: &dyn Discoverer,
    filter: &CandidateFilter,
    seeds: &[String],
) -> Vec<String> {
    match discoverer.discover_candidates(seeds).await {
        Ok(raw) => {
            let total = raw.len();
            let kept = filter.apply(raw);
            debug!(total, kept = kept.len(), "Candidates discovered");
            kept
        }
        Err(e) => {
            warn!(error = %e, "Discoverer failed, treating as no candidates");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct FailingDiscoverer;

    #[async_trait]
    impl Discoverer for FailingDiscoverer {
        async fn discover_candidates(&self, _: &[String]) -> Result<Vec<String>, MonitorError> {
            Err(MonitorError::Discovery("browser crashed".to_string()))
        }
    }

    #[test]
    fn test_is_potential_api_url() {
        let filter = CandidateFilter::new("bc.game");
        assert!(filter.is_potential_api_url("https://bc.game/api/sport/events"));
        assert!(filter.is_potential_api_url("https://api.bc.game/cache/Prematch/1"));
        assert!(filter.is_potential_api_url("https://bc.game/feed/odds.JSON"));
        assert!(!filter.is_potential_api_url("https://bc.game/sport/soccer"));
        assert!(!filter.is_potential_api_url("https://other.example/api/odds"));
    }

    #[test]
    fn test_empty_host_only_checks_indicators() {
        let filter = CandidateFilter::new("");
        assert!(filter.is_potential_api_url("http://127.0.0.1:8080/api/odds"));
        assert!(!filter.is_potential_api_url("http://127.0.0.1:8080/index.html"));
    }

    #[test]
    fn test_apply_dedups_in_order() {
        let filter = CandidateFilter::new("bc.game");
        let out = filter.apply(vec![
            "https://bc.game/api/b".to_string(),
            "https://bc.game/about".to_string(),
            " https://bc.game/api/a ".to_string(),
            "https://bc.game/api/b".to_string(),
        ]);
        assert_eq!(out, vec!["https://bc.game/api/b", "https://bc.game/api/a"]);
    }

    #[tokio::test]
    async fn test_file_discoverer_skips_comments_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.txt");
        assert!(FileDiscoverer::new(&path)
            .discover_candidates(&[])
            .await
            .unwrap()
            .is_empty());

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# sniffed 2026-10-01").unwrap();
        writeln!(file, "https://bc.game/api/one").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  https://bc.game/api/two  ").unwrap();
        drop(file);

        let found = FileDiscoverer::new(&path).discover_candidates(&[]).await.unwrap();
        assert_eq!(found, vec!["https://bc.game/api/one", "https://bc.game/api/two"]);
    }

    #[tokio::test]
    async fn test_discover_filtered_swallows_errors() {
        let filter = CandidateFilter::new("bc.game");
        assert!(discover_filtered(&FailingDiscoverer, &filter, &[]).await.is_empty());

        let static_discoverer = StaticDiscoverer::new(["https://bc.game/api/x", "nope"]);
        assert_eq!(
            discover_filtered(&static_discoverer, &filter, &[]).await,
            vec!["https://bc.game/api/x"]
        );
        assert!(discover_filtered(&NoopDiscoverer, &filter, &[]).await.is_empty());
    }
}
