//! エンドポイント監視（オーケストレータ）
//!
//! Prober・ConditionalFetcher・検証・ブレーカー・レート制限・ストア・
//! Discoverer を組み合わせ、`test_endpoint` / `check_and_update` /
//! `run_loop` を提供する。
//!
//! Within one `test_endpoint` call the gates are checked first, then the
//! probe runs, then (only if needed) the fetch. No lock is held across any
//! network call; the state cache is copied out and written back.

pub mod context;
pub mod retry;
pub mod runner;
pub mod stats;

use chrono::Utc;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::common::MonitorError;
use crate::discovery::{discover_filtered, CandidateFilter, Discoverer};
use crate::http::{ConditionalFetcher, FetchResponse, ProbeFailurePolicy, Prober};
use crate::types::endpoint::{DISCOVERY_AUTO, DISCOVERY_AUTO_UPDATE};
use crate::types::{ProbeResult, TestResult};
use crate::validation;

pub use context::MonitorContext;
pub use retry::RetryPolicy;
pub use runner::{LoopSettings, LoopSummary};
pub use stats::{MonitorStats, MonitorStatsSnapshot};

/// Endpoints kept after the initial discovery.
pub const INITIAL_DISCOVERY_LIMIT: usize = 3;
/// Endpoints kept after replacing failed ones.
pub const MAX_ENDPOINTS: usize = 5;

/// Outcome of one sweep over the endpoints due for a probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSweep {
    /// Probes issued
    pub probed: usize,
    /// Probes reporting a change
    pub changed: usize,
    /// Probes that failed
    pub failed: usize,
    /// Probes skipped by the breaker or the limiter
    pub denied: usize,
}

/// Resilient endpoint monitor
#[derive(Clone)]
pub struct EndpointMonitor {
    ctx: MonitorContext,
    prober: Prober,
    fetcher: ConditionalFetcher,
    discoverer: Arc<dyn Discoverer>,
    filter: CandidateFilter,
}

impl std::fmt::Debug for EndpointMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointMonitor")
            .field("data_dir", &self.ctx.config.data_dir)
            .field("policy", &self.prober.policy())
            .finish()
    }
}

impl EndpointMonitor {
    /// Monitor over `ctx` using `discoverer` for candidates.
    pub fn new(ctx: MonitorContext, discoverer: Arc<dyn Discoverer>) -> Self {
        let prober = Prober::new(
            ctx.client.clone(),
            ctx.cache.clone(),
            ctx.config.probe_failure_policy,
        );
        let fetcher = ConditionalFetcher::new(ctx.client.clone(), ctx.cache.clone());
        let filter = CandidateFilter::new(ctx.config.site_host.clone());
        Self {
            ctx,
            prober,
            fetcher,
            discoverer,
            filter,
        }
    }

    /// Override the HEAD and GET timeouts.
    pub fn with_timeouts(mut self, probe: Duration, fetch: Duration) -> Self {
        self.prober = self.prober.with_timeout(probe);
        self.fetcher = self.fetcher.with_timeout(fetch);
        self
    }

    /// Shared state.
    pub fn context(&self) -> &MonitorContext {
        &self.ctx
    }

    fn admit(&self) -> Result<(), MonitorError> {
        if !self.ctx.breaker.can_execute() {
            return Err(MonitorError::CircuitOpen);
        }
        if !self.ctx.limiter.can_proceed() {
            return Err(MonitorError::RateLimited(self.ctx.limiter.wait_time()));
        }
        Ok(())
    }

    /// Probe, fetch if needed, validate. Never fails; problems are reported
    /// as an unavailable result whose `error` starts with the reason tag.
    pub async fn test_endpoint(&self, url: &str) -> TestResult {
        if let Err(denial) = self.admit() {
            info!(url, reason = denial.kind(), "Endpoint test denied locally");
            return TestResult::unavailable(url, &denial);
        }

        let prior = self.ctx.cache.test_result(url);
        let probe = self.prober.probe(url).await;
        self.ctx
            .stats
            .record_probe(probe.has_changes, probe.is_failure());

        if !probe.has_changes {
            if let Some(mut cached) = prior.clone() {
                if cached.available && !probe.is_failure() {
                    self.ctx.breaker.record_success();
                } else {
                    self.ctx.breaker.record_failure();
                }
                self.ctx.stats.record_cache_hit();
                debug!(url, available = cached.available, "Serving cached test result");
                cached.from_cache = true;
                return cached;
            }
        } else {
            self.ctx.cache.invalidate_result(url);
        }

        // After a real change the prior verdict is stale, and the HEAD's
        // validators name the new payload; send the ones stored at the last 200.
        let changed_upstream = probe.has_changes && !probe.is_failure();
        let (prior, probe_for_fetch) = if changed_upstream {
            (None, None)
        } else {
            (prior, Some(&probe))
        };

        let result = match self
            .fetch_and_validate(url, probe_for_fetch, prior.as_ref())
            .await
        {
            Ok(result) => {
                let stored = result.clone();
                self.ctx
                    .cache
                    .update(url, |state| state.test_result = Some(stored));
                result
            }
            Err(e) => {
                warn!(url, error = %e, kind = e.kind(), "Endpoint test failed");
                TestResult::unavailable(url, &e)
            }
        };

        if result.available {
            self.ctx.breaker.record_success();
        } else {
            self.ctx.breaker.record_failure();
        }
        info!(
            url,
            status = result.status_code,
            available = result.available,
            breaker = self.ctx.breaker.state().as_str(),
            "Endpoint tested"
        );
        result
    }

    async fn fetch_and_validate(
        &self,
        url: &str,
        probe: Option<&ProbeResult>,
        prior: Option<&TestResult>,
    ) -> Result<TestResult, MonitorError> {
        let mut resp = self.fetcher.fetch(url, probe).await?;

        if resp.is_not_modified() {
            self.ctx.stats.record_fetch(true);
            if let Some(prior) = prior.filter(|p| p.validation.is_some()) {
                let mut reused = prior.clone();
                reused.status_code = resp.status;
                reused.from_cache = false;
                reused.test_time = Utc::now();
                return Ok(reused);
            }
            // No verdict to reuse; a 304 tells us nothing about the payload.
            debug!(url, "304 without a prior verdict, refetching unconditionally");
            resp = self.fetcher.fetch_unconditional(url).await?;
            if resp.is_not_modified() {
                return Err(MonitorError::Status(resp.status));
            }
        }

        self.ctx.stats.record_fetch(false);
        Ok(self.evaluate(url, resp))
    }

    fn evaluate(&self, url: &str, resp: FetchResponse) -> TestResult {
        let body = resp.body.unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(&body);
        let content_hash = format!("{:x}", hasher.finalize());
        self.ctx.cache.set_content_hash(url, content_hash.clone());

        let verdict = validation::validate_bytes(&body);

        let error = if verdict.is_valid {
            None
        } else {
            self.ctx.stats.record_validation_failure();
            let err = MonitorError::Validation(verdict.errors.join("; "));
            warn!(
                url,
                errors = verdict.errors.len(),
                warnings = verdict.warnings.len(),
                total = verdict.total_matches,
                "Payload failed validation"
            );
            Some(format!("{}: {}", err.kind(), err))
        };

        TestResult {
            url: url.to_string(),
            status_code: resp.status,
            available: verdict.is_valid,
            response_size: body.len(),
            content_type: resp.content_type.unwrap_or_default(),
            validation: Some(verdict),
            content_hash: Some(content_hash),
            from_cache: false,
            error,
            test_time: Utc::now(),
        }
    }

    async fn discover(&self) -> Vec<String> {
        discover_filtered(
            self.discoverer.as_ref(),
            &self.filter,
            &self.ctx.config.seed_urls,
        )
        .await
    }

    /// Test `candidates` concurrently and keep, in order, the first `limit`
    /// whose payload passed validation.
    async fn validated_candidates(&self, candidates: &[String], limit: usize) -> Vec<String> {
        let results = join_all(candidates.iter().map(|url| self.test_endpoint(url))).await;
        candidates
            .iter()
            .zip(results)
            .filter(|(_, result)| result.available && result.validation_passed())
            .map(|(url, _)| url.clone())
            .take(limit)
            .collect()
    }

    /// Reconcile the persisted endpoint list with reality.
    ///
    /// Returns `Ok(true)` when a new list was persisted. A failed save is
    /// returned as an error and the list must not be assumed changed.
    pub async fn check_and_update(&self) -> Result<bool, MonitorError> {
        let mut config = self.ctx.store.load();
        let now = Utc::now();

        if config.endpoints.is_empty() {
            warn!("No endpoints configured, starting discovery");
            let candidates = self.discover().await;
            let kept = self
                .validated_candidates(&candidates, INITIAL_DISCOVERY_LIMIT)
                .await;
            if kept.is_empty() {
                info!(candidates = candidates.len(), "Discovery found no valid endpoint");
                return Ok(false);
            }
            config.set_endpoints(kept);
            config.last_updated = Some(now);
            config.discovery_method = DISCOVERY_AUTO.to_string();
            config.notes = format!("auto-discovered at {}", now.format("%Y-%m-%d %H:%M:%S"));
            self.ctx.store.save(&config)?;
            info!(endpoints = ?config.endpoints, "Endpoints discovered");
            return Ok(true);
        }

        let original = config.endpoints.clone();
        let results = join_all(original.iter().map(|url| self.test_endpoint(url))).await;

        let mut working = Vec::new();
        let mut failed = Vec::new();
        for (url, result) in original.iter().zip(&results) {
            if result.available {
                working.push(url.clone());
            } else if result.denied_locally() {
                // Not tested this round; keep it rather than judge it.
                debug!(url = %url, "Endpoint not tested (local denial), keeping");
                working.push(url.clone());
            } else {
                warn!(url = %url, status = result.status_code, error = ?result.error, "Endpoint failed");
                failed.push(url.clone());
            }
        }

        if failed.is_empty() {
            info!(endpoints = original.len(), "All endpoints healthy, no update needed");
            return Ok(false);
        }

        info!(failed = failed.len(), "Failed endpoints detected, looking for replacements");
        let fresh: Vec<String> = self
            .discover()
            .await
            .into_iter()
            .filter(|url| !working.contains(url))
            .collect();
        let replacements = self.validated_candidates(&fresh, usize::MAX).await;
        for url in replacements {
            info!(url = %url, "New working endpoint found");
            working.push(url);
        }
        working.truncate(MAX_ENDPOINTS);

        if working == original {
            return Ok(false);
        }

        config.set_endpoints(working);
        config.last_updated = Some(now);
        config.discovery_method = DISCOVERY_AUTO_UPDATE.to_string();
        config.notes = format!(
            "auto-updated at {}, replaced {} failed endpoint(s)",
            now.format("%Y-%m-%d %H:%M:%S"),
            failed.len()
        );
        self.ctx.store.save(&config)?;
        info!(endpoints = ?config.endpoints, "Endpoint config updated");
        Ok(true)
    }

    /// Probe every configured endpoint whose last probe is older than the
    /// probe interval. Changed endpoints lose their cached test result.
    pub async fn probe_due_endpoints(&self) -> ProbeSweep {
        let endpoints = self.ctx.store.load().endpoints;
        let due = self.ctx.cache.due_for_probe(
            &endpoints,
            Utc::now(),
            self.ctx.config.probe_interval,
        );

        let mut sweep = ProbeSweep::default();
        for url in due {
            if let Err(denial) = self.admit() {
                debug!(url = %url, reason = denial.kind(), "Probe skipped");
                sweep.denied += 1;
                continue;
            }
            let probe = self.prober.probe(&url).await;
            self.ctx
                .stats
                .record_probe(probe.has_changes, probe.is_failure());
            sweep.probed += 1;

            if probe.is_failure() {
                sweep.failed += 1;
                self.ctx.breaker.record_failure();
            } else {
                self.ctx.breaker.record_success();
            }
            if probe.has_changes {
                sweep.changed += 1;
                self.ctx.cache.invalidate_result(&url);
            }
        }
        sweep
    }

    /// Failure policy of the prober.
    pub fn probe_failure_policy(&self) -> ProbeFailurePolicy {
        self.prober.policy()
    }
}
