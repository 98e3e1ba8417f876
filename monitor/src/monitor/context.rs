//! 監視コンテキスト
//!
//! ブレーカー・レート制限・ストア・状態キャッシュ・HTTPクライアントを一つに束ね、
//! 各コンポーネントへ明示的に渡す。プロセス全体のグローバル状態は持たない。

use std::sync::Arc;

use super::stats::MonitorStats;
use crate::common::MonitorError;
use crate::config::MonitorConfig;
use crate::guard::{CircuitBreaker, RateLimiter};
use crate::http::build_client;
use crate::store::{EndpointStateCache, EndpointStore};

/// Shared state of one monitor instance
#[derive(Debug, Clone)]
pub struct MonitorContext {
    /// Tunables
    pub config: Arc<MonitorConfig>,
    /// Global admission gate for all endpoints
    pub breaker: Arc<CircuitBreaker>,
    /// Global request budget
    pub limiter: Arc<RateLimiter>,
    /// Config and cache persistence
    pub store: Arc<EndpointStore>,
    /// Per-URL probe/fetch state
    pub cache: EndpointStateCache,
    /// Pooled HTTP client
    pub client: reqwest::Client,
    /// Counters
    pub stats: Arc<MonitorStats>,
}

impl MonitorContext {
    /// Build a context from `config`, seeding the state cache from disk.
    pub fn new(config: MonitorConfig) -> Result<Self, MonitorError> {
        let client = build_client()?;
        Ok(Self::with_client(config, client))
    }

    /// Build a context around an existing client.
    pub fn with_client(config: MonitorConfig, client: reqwest::Client) -> Self {
        let store = EndpointStore::new(&config.data_dir);
        let cache = EndpointStateCache::from_file(store.load_state_cache());
        Self {
            breaker: Arc::new(CircuitBreaker::new(config.breaker)),
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit_max,
                config.rate_limit_window,
            )),
            store: Arc::new(store),
            cache,
            client,
            stats: Arc::new(MonitorStats::default()),
            config: Arc::new(config),
        }
    }

    /// Persist the endpoint-state cache.
    pub fn persist_cache(&self) -> Result<(), MonitorError> {
        self.store.save_state_cache(&self.cache.snapshot())?;
        Ok(())
    }
}
