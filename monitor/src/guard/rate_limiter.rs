//! Sliding-window rate limiter.
//!
//! Admits at most `max_requests` calls inside any trailing `time_window`.
//! Denied calls never consume a slot.

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Sliding-window admission control shared by every endpoint.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    time_window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `time_window`.
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        Self {
            max_requests,
            time_window,
            requests: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Maximum admissions per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Window length.
    pub fn time_window(&self) -> Duration {
        self.time_window
    }

    /// Try to take a slot now.
    pub fn can_proceed(&self) -> bool {
        self.can_proceed_at(Instant::now())
    }

    /// Time until the oldest retained admission leaves the window.
    pub fn wait_time(&self) -> Duration {
        self.wait_time_at(Instant::now())
    }

    /// Admissions currently inside the window.
    pub fn in_window(&self) -> usize {
        let mut requests = self.lock();
        Self::prune(&mut requests, Instant::now(), self.time_window);
        requests.len()
    }

    pub(crate) fn can_proceed_at(&self, now: Instant) -> bool {
        let mut requests = self.lock();
        Self::prune(&mut requests, now, self.time_window);
        if requests.len() < self.max_requests {
            requests.push_back(now);
            true
        } else {
            false
        }
    }

    pub(crate) fn wait_time_at(&self, now: Instant) -> Duration {
        let mut requests = self.lock();
        Self::prune(&mut requests, now, self.time_window);
        match requests.front() {
            Some(oldest) => self
                .time_window
                .saturating_sub(now.saturating_duration_since(*oldest)),
            None => Duration::ZERO,
        }
    }

    fn prune(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = requests.front() {
            if now.saturating_duration_since(*oldest) >= window {
                requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        // A panic while holding the guard cannot leave the deque half-updated.
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
