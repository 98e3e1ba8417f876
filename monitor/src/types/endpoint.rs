//! エンドポイント設定・状態の型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TestResult;

/// Current schema version of the persisted endpoint configuration.
pub const CONFIG_SCHEMA_VERSION: &str = "2.0";

/// Discovery method tag of a config that was never touched by the monitor.
pub const DISCOVERY_MANUAL: &str = "manual";
/// Discovery method tag after the initial automatic discovery.
pub const DISCOVERY_AUTO: &str = "auto_discovery";
/// Discovery method tag after failed endpoints were replaced.
pub const DISCOVERY_AUTO_UPDATE: &str = "auto_update";

/// Capabilities advertised in the persisted config.
pub const DEFAULT_FEATURES: &[&str] = &[
    "conditional_requests",
    "side_probe",
    "circuit_breaker",
    "rate_limiting",
    "payload_validation",
    "atomic_persistence",
];

fn default_discovery_method() -> String {
    DISCOVERY_MANUAL.to_string()
}

fn default_version() -> String {
    CONFIG_SCHEMA_VERSION.to_string()
}

/// Authoritative endpoint list persisted as `api_config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Ordered endpoint URLs (unique)
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// When the list was last written by the monitor
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// How the current list was obtained
    #[serde(default = "default_discovery_method")]
    pub discovery_method: String,
    /// Free-text notes
    #[serde(default)]
    pub notes: String,
    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,
    /// Capability tags
    #[serde(default)]
    pub features: Vec<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            last_updated: None,
            discovery_method: default_discovery_method(),
            notes: "default configuration".to_string(),
            version: default_version(),
            features: DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl EndpointConfig {
    /// Appends `url` unless it is already present. Returns true when added.
    pub fn push_unique(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.endpoints.contains(&url) {
            return false;
        }
        self.endpoints.push(url);
        true
    }

    /// Replaces the endpoint list, keeping first occurrences only.
    pub fn set_endpoints<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.clear();
        for url in urls {
            self.push_unique(url);
        }
    }

    /// Drops duplicate URLs in place (first occurrence wins).
    pub fn dedup_endpoints(&mut self) {
        let urls = std::mem::take(&mut self.endpoints);
        self.set_endpoints(urls);
    }

    /// Returns true when the config holds `url`.
    pub fn contains(&self, url: &str) -> bool {
        self.endpoints.iter().any(|e| e == url)
    }
}

/// Per-URL state kept in the endpoint-state cache
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointState {
    /// Last ETag seen on a full fetch
    #[serde(default)]
    pub etag: Option<String>,
    /// Last Last-Modified seen on a full fetch
    #[serde(default)]
    pub last_modified: Option<String>,
    /// HEAD fingerprint from the last successful probe
    #[serde(default)]
    pub content_hash: Option<String>,
    /// When the endpoint was last probed successfully
    #[serde(default)]
    pub last_probe: Option<DateTime<Utc>>,
    /// When the endpoint was last fetched with a 200
    #[serde(default)]
    pub last_fetch: Option<DateTime<Utc>>,
    /// Cached outcome of the last `test_endpoint`
    #[serde(default)]
    pub test_result: Option<TestResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_empty_and_versioned() {
        let config = EndpointConfig::default();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.version, CONFIG_SCHEMA_VERSION);
        assert_eq!(config.discovery_method, DISCOVERY_MANUAL);
        assert!(config.last_updated.is_none());
        assert!(config.features.iter().any(|f| f == "atomic_persistence"));
    }

    #[test]
    fn test_push_unique_rejects_duplicates() {
        let mut config = EndpointConfig::default();
        assert!(config.push_unique("https://a.example/api/x"));
        assert!(!config.push_unique("https://a.example/api/x"));
        assert_eq!(config.endpoints.len(), 1);
    }

    #[test]
    fn test_set_endpoints_keeps_first_occurrence_order() {
        let mut config = EndpointConfig::default();
        config.set_endpoints(["b", "a", "b", "c", "a"]);
        assert_eq!(config.endpoints, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        // Files written by the legacy updater only carry four keys.
        let json = r#"{"endpoints":["u1"],"last_updated":null,"discovery_method":"manual","notes":"x"}"#;
        let config: EndpointConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.endpoints, vec!["u1"]);
        assert_eq!(config.version, CONFIG_SCHEMA_VERSION);
        assert!(config.features.is_empty());
    }

    #[test]
    fn test_config_json_shape() {
        let config = EndpointConfig::default();
        let value = serde_json::to_value(&config).unwrap();
        for key in [
            "endpoints",
            "last_updated",
            "discovery_method",
            "notes",
            "version",
            "features",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert!(value["last_updated"].is_null());
    }
}
