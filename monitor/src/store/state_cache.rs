//! In-memory endpoint-state cache.
//!
//! One mutex guards the whole map; callers copy entries out and write them
//! back through closures, so no lock is ever held across a network call.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use crate::types::{EndpointState, TestResult};

/// On-disk layout of `endpoint_cache.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateCacheFile {
    /// Per-URL state
    #[serde(default)]
    pub endpoint_cache: BTreeMap<String, EndpointState>,
    /// SHA-256 of the last fetched body per URL
    #[serde(default)]
    pub content_hashes: BTreeMap<String, String>,
    /// When the file was written
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, EndpointState>,
    content_hashes: HashMap<String, String>,
}

/// Shared endpoint-state cache
#[derive(Debug, Clone, Default)]
pub struct EndpointStateCache {
    inner: Arc<Mutex<Inner>>,
}

impl EndpointStateCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache seeded from a persisted file.
    pub fn from_file(file: StateCacheFile) -> Self {
        let cache = Self::new();
        cache.restore(file);
        cache
    }

    /// Copy of the entry for `url`.
    pub fn get(&self, url: &str) -> Option<EndpointState> {
        self.lock().entries.get(url).cloned()
    }

    /// Cached test result for `url`.
    pub fn test_result(&self, url: &str) -> Option<TestResult> {
        self.lock()
            .entries
            .get(url)
            .and_then(|state| state.test_result.clone())
    }

    /// Mutate the entry for `url`, creating it on first use.
    pub fn update<F>(&self, url: &str, f: F)
    where
        F: FnOnce(&mut EndpointState),
    {
        let mut inner = self.lock();
        f(inner.entries.entry(url.to_string()).or_default());
    }

    /// Drop the cached test result for `url`.
    pub fn invalidate_result(&self, url: &str) {
        if let Some(state) = self.lock().entries.get_mut(url) {
            state.test_result = None;
        }
    }

    /// Record the body hash of the last full fetch.
    pub fn set_content_hash(&self, url: &str, hash: String) {
        self.lock().content_hashes.insert(url.to_string(), hash);
    }

    /// Body hash of the last full fetch.
    pub fn content_hash(&self, url: &str) -> Option<String> {
        self.lock().content_hashes.get(url).cloned()
    }

    /// Number of cached endpoints.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Explicit eviction of every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.content_hashes.clear();
    }

    /// URLs among `urls` whose last successful probe is older than `interval`
    /// (or that were never probed), in input order.
    pub fn due_for_probe(
        &self,
        urls: &[String],
        now: DateTime<Utc>,
        interval: Duration,
    ) -> Vec<String> {
        let interval =
            ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::weeks(5200));
        let inner = self.lock();
        urls.iter()
            .filter(|url| {
                match inner.entries.get(url.as_str()).and_then(|s| s.last_probe) {
                    Some(last) => now.signed_duration_since(last) >= interval,
                    None => true,
                }
            })
            .cloned()
            .collect()
    }

    /// Serializable copy of the whole cache.
    pub fn snapshot(&self) -> StateCacheFile {
        let inner = self.lock();
        StateCacheFile {
            endpoint_cache: inner
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            content_hashes: inner
                .content_hashes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            last_updated: Some(Utc::now()),
        }
    }

    /// Replace the cache contents with a persisted file.
    pub fn restore(&self, file: StateCacheFile) {
        let mut inner = self.lock();
        inner.entries = file.endpoint_cache.into_iter().collect();
        inner.content_hashes = file.content_hashes.into_iter().collect();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
