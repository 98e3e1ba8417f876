//! 監視統計カウンタ

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters, updated lock-free
#[derive(Debug, Default)]
pub struct MonitorStats {
    probes: AtomicU64,
    probe_changes: AtomicU64,
    probe_failures: AtomicU64,
    cache_hits: AtomicU64,
    fetches: AtomicU64,
    not_modified: AtomicU64,
    validation_failures: AtomicU64,
}

/// Point-in-time copy of `MonitorStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatsSnapshot {
    /// HEAD probes issued
    pub probes: u64,
    /// Probes that reported a change
    pub probe_changes: u64,
    /// Probes that failed
    pub probe_failures: u64,
    /// Results served from the endpoint-state cache
    pub cache_hits: u64,
    /// GET requests issued
    pub fetches: u64,
    /// 304 responses
    pub not_modified: u64,
    /// 200 responses whose payload failed validation
    pub validation_failures: u64,
}

impl MonitorStats {
    pub(crate) fn record_probe(&self, has_changes: bool, failed: bool) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        if has_changes {
            self.probe_changes.fetch_add(1, Ordering::Relaxed);
        }
        if failed {
            self.probe_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self, not_modified: bool) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if not_modified {
            self.not_modified.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn snapshot(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            probes: self.probes.load(Ordering::Relaxed),
            probe_changes: self.probe_changes.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            not_modified: self.not_modified.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
        }
    }
}
