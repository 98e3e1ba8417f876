//! Configuration management via environment variables
//!
//! Every tunable is read from an `ODDSFEED_*` variable into `MonitorConfig`,
//! the single bundle handed to the monitor. `LOG_LEVEL` is the only old name
//! still honoured (see `logging`).

use std::path::PathBuf;
use std::time::Duration;

use crate::guard::CircuitBreakerConfig;
use crate::http::ProbeFailurePolicy;

/// Site the endpoints belong to; candidate URLs on other hosts are ignored.
pub const DEFAULT_SITE_HOST: &str = "bc.game";
/// Default seed handed to the discoverer.
pub const DEFAULT_SEED_URL: &str = "https://bc.game/sport/soccer";

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning. Only the log level still has an old name.
///
/// # Example
/// ```
/// use oddsfeed_monitor::config::get_env_with_fallback;
///
/// let level = get_env_with_fallback("ODDSFEED_LOG_LEVEL", "LOG_LEVEL");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// Non-empty value of `name`.
pub fn get_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `name`, returning `default` when unset or unparsable.
pub fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match get_env(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(get_env_parse(name, default))
}

/// データディレクトリを取得
///
/// 環境変数 `ODDSFEED_DATA_DIR`、未設定なら `$HOME/.oddsfeed`。
/// HOME も無い環境（systemd、最小コンテナ）では一時ディレクトリを使う。
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = get_env("ODDSFEED_DATA_DIR") {
        return PathBuf::from(dir);
    }
    match std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        Ok(home) => PathBuf::from(home).join(".oddsfeed"),
        Err(_) => std::env::temp_dir().join("oddsfeed"),
    }
}

/// Comma or whitespace separated list.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// All monitor tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Directory holding the config, the state cache, the lock and logs
    pub data_dir: PathBuf,
    /// Cadence of `check_and_update` inside the run loop
    pub check_interval: Duration,
    /// Age after which an endpoint is probed again
    pub probe_interval: Duration,
    /// Sleep between loop cycles
    pub loop_tick: Duration,
    /// Sleep after too many consecutive failed cycles
    pub error_backoff: Duration,
    /// RateLimiter capacity
    pub rate_limit_max: usize,
    /// RateLimiter window
    pub rate_limit_window: Duration,
    /// Shared circuit breaker thresholds
    pub breaker: CircuitBreakerConfig,
    /// How a failed HEAD probe is interpreted
    pub probe_failure_policy: ProbeFailurePolicy,
    /// Seeds handed to the discoverer
    pub seed_urls: Vec<String>,
    /// Candidate list written by the external sniffer
    pub candidates_file: Option<PathBuf>,
    /// Host that candidate URLs must belong to
    pub site_host: String,
    /// Directory for rolling log files (defaults to `<data_dir>/logs`)
    pub log_dir: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join("oddsfeed"),
            check_interval: Duration::from_secs(3600),
            probe_interval: Duration::from_secs(300),
            loop_tick: Duration::from_secs(300),
            error_backoff: Duration::from_secs(600),
            rate_limit_max: 10,
            rate_limit_window: Duration::from_secs(60),
            breaker: CircuitBreakerConfig::default(),
            probe_failure_policy: ProbeFailurePolicy::default(),
            seed_urls: vec![DEFAULT_SEED_URL.to_string()],
            candidates_file: None,
            site_host: DEFAULT_SITE_HOST.to_string(),
            log_dir: None,
        }
    }
}

impl MonitorConfig {
    /// Load every tunable from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let probe_failure_policy = match get_env("ODDSFEED_PROBE_FAILURE_POLICY") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Invalid probe failure policy, using default");
                defaults.probe_failure_policy
            }),
            None => defaults.probe_failure_policy,
        };

        let seed_urls = get_env("ODDSFEED_SEED_URLS")
            .map(|raw| split_list(&raw))
            .filter(|seeds| !seeds.is_empty())
            .unwrap_or(defaults.seed_urls);

        Self {
            data_dir: default_data_dir(),
            check_interval: env_secs("ODDSFEED_CHECK_INTERVAL_SECS", 3600),
            probe_interval: env_secs("ODDSFEED_PROBE_INTERVAL_SECS", 300),
            loop_tick: env_secs("ODDSFEED_LOOP_TICK_SECS", 300),
            error_backoff: env_secs("ODDSFEED_ERROR_BACKOFF_SECS", 600),
            rate_limit_max: get_env_parse("ODDSFEED_RATE_LIMIT_MAX", defaults.rate_limit_max).max(1),
            rate_limit_window: env_secs("ODDSFEED_RATE_LIMIT_WINDOW_SECS", 60),
            breaker: CircuitBreakerConfig {
                failure_threshold: get_env_parse(
                    "ODDSFEED_BREAKER_FAILURES",
                    defaults.breaker.failure_threshold,
                )
                .max(1),
                success_threshold: get_env_parse(
                    "ODDSFEED_BREAKER_SUCCESSES",
                    defaults.breaker.success_threshold,
                )
                .max(1),
                recovery_timeout: env_secs("ODDSFEED_BREAKER_RECOVERY_SECS", 60),
            },
            probe_failure_policy,
            seed_urls,
            candidates_file: get_env("ODDSFEED_CANDIDATES_FILE").map(PathBuf::from),
            site_host: get_env("ODDSFEED_SITE_HOST")
                .unwrap_or_else(|| DEFAULT_SITE_HOST.to_string()),
            log_dir: get_env("ODDSFEED_LOG_DIR").map(PathBuf::from),
        }
    }

    /// Effective log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const MONITOR_VARS: &[&str] = &[
        "ODDSFEED_DATA_DIR",
        "ODDSFEED_CHECK_INTERVAL_SECS",
        "CHECK_INTERVAL_SECS",
        "DATA_DIR",
        "ODDSFEED_RATE_LIMIT_MAX",
        "ODDSFEED_BREAKER_FAILURES",
        "ODDSFEED_PROBE_FAILURE_POLICY",
        "ODDSFEED_SEED_URLS",
        "ODDSFEED_CANDIDATES_FILE",
        "ODDSFEED_LOG_DIR",
    ];

    fn clear_monitor_vars() {
        for name in MONITOR_VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_new_name() {
        std::env::set_var("TEST_NEW_VAR", "new_value");
        std::env::remove_var("TEST_OLD_VAR");

        let result = get_env_with_fallback("TEST_NEW_VAR", "TEST_OLD_VAR");
        assert_eq!(result, Some("new_value".to_string()));

        std::env::remove_var("TEST_NEW_VAR");
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_old_name() {
        std::env::remove_var("TEST_NEW_VAR2");
        std::env::set_var("TEST_OLD_VAR2", "old_value");

        let result = get_env_with_fallback("TEST_NEW_VAR2", "TEST_OLD_VAR2");
        assert_eq!(result, Some("old_value".to_string()));

        std::env::remove_var("TEST_OLD_VAR2");
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_new_takes_precedence() {
        std::env::set_var("TEST_NEW_VAR4", "new_value");
        std::env::set_var("TEST_OLD_VAR4", "old_value");

        let result = get_env_with_fallback("TEST_NEW_VAR4", "TEST_OLD_VAR4");
        assert_eq!(result, Some("new_value".to_string()));

        std::env::remove_var("TEST_NEW_VAR4");
        std::env::remove_var("TEST_OLD_VAR4");
    }

    #[test]
    #[serial]
    fn test_get_env_parse_invalid_uses_default() {
        std::env::set_var("TEST_PARSE_VAR", "not-a-number");
        assert_eq!(get_env_parse("TEST_PARSE_VAR", 7u64), 7);
        std::env::set_var("TEST_PARSE_VAR", " 42 ");
        assert_eq!(get_env_parse("TEST_PARSE_VAR", 7u64), 42);
        std::env::set_var("TEST_PARSE_VAR", "  ");
        assert_eq!(get_env("TEST_PARSE_VAR"), None);
        std::env::remove_var("TEST_PARSE_VAR");
    }

    #[test]
    #[serial]
    fn test_monitor_config_defaults() {
        clear_monitor_vars();
        std::env::set_var("ODDSFEED_DATA_DIR", "/tmp/oddsfeed-test");

        let config = MonitorConfig::from_env();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/oddsfeed-test"));
        assert_eq!(config.check_interval, Duration::from_secs(3600));
        assert_eq!(config.probe_interval, Duration::from_secs(300));
        assert_eq!(config.error_backoff, Duration::from_secs(600));
        assert_eq!(config.rate_limit_max, 10);
        assert_eq!(config.breaker, CircuitBreakerConfig::default());
        assert_eq!(config.probe_failure_policy, ProbeFailurePolicy::AssumeChanged);
        assert_eq!(config.seed_urls, vec![DEFAULT_SEED_URL.to_string()]);
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/oddsfeed-test/logs"));

        clear_monitor_vars();
    }

    #[test]
    #[serial]
    fn test_monitor_config_from_env_overrides() {
        clear_monitor_vars();
        std::env::set_var("ODDSFEED_CHECK_INTERVAL_SECS", "120");
        std::env::set_var("ODDSFEED_RATE_LIMIT_MAX", "0");
        std::env::set_var("ODDSFEED_BREAKER_FAILURES", "3");
        std::env::set_var("ODDSFEED_PROBE_FAILURE_POLICY", "assume_unchanged");
        std::env::set_var("ODDSFEED_SEED_URLS", "https://a.example, https://b.example");
        std::env::set_var("ODDSFEED_CANDIDATES_FILE", "/tmp/candidates.txt");

        let config = MonitorConfig::from_env();
        assert_eq!(config.check_interval, Duration::from_secs(120));
        assert_eq!(config.rate_limit_max, 1);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.probe_failure_policy, ProbeFailurePolicy::AssumeUnchanged);
        assert_eq!(
            config.seed_urls,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(
            config.candidates_file,
            Some(PathBuf::from("/tmp/candidates.txt"))
        );

        clear_monitor_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_policy_falls_back_to_default() {
        clear_monitor_vars();
        std::env::set_var("ODDSFEED_PROBE_FAILURE_POLICY", "sometimes");
        let config = MonitorConfig::from_env();
        assert_eq!(config.probe_failure_policy, ProbeFailurePolicy::AssumeChanged);
        clear_monitor_vars();
    }

    #[test]
    #[serial]
    fn test_unprefixed_names_are_ignored() {
        clear_monitor_vars();
        std::env::set_var("CHECK_INTERVAL_SECS", "120");
        std::env::set_var("DATA_DIR", "/tmp/elsewhere");
        let config = MonitorConfig::from_env();
        assert_eq!(config.check_interval, Duration::from_secs(3600));
        assert_ne!(config.data_dir, PathBuf::from("/tmp/elsewhere"));
        clear_monitor_vars();
    }
}
