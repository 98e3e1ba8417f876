//! Cooperative shutdown controller.
//!
//! `main.rs` wires OS signals to this; the run loop observes it in every sleep
//! and races it against in-flight work.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::Notify;

/// Cooperative shutdown signal shared by the run loop and its owner.
#[derive(Clone, Debug, Default)]
pub struct ShutdownController {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownController {
    /// Returns true if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Request shutdown and wake all waiters.
    pub fn request_shutdown(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Wait until shutdown is requested.
    pub async fn wait(&self) {
        loop {
            // Register before checking the flag so a request between the two is not lost.
            let notified = self.inner.notify.notified();
            if self.is_shutdown_requested() {
                return;
            }
            notified.await;
            if self.is_shutdown_requested() {
                return;
            }
        }
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns false when the sleep was cut short by shutdown.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_shutdown_requested(),
            _ = self.wait() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_after_request() {
        let shutdown = ShutdownController::default();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };
        tokio::task::yield_now().await;
        shutdown.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_after_request_is_immediate() {
        let shutdown = ShutdownController::default();
        shutdown.request_shutdown();
        shutdown.wait().await;
        assert!(shutdown.is_shutdown_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_cut_short() {
        let shutdown = ShutdownController::default();
        assert!(shutdown.sleep(Duration::from_secs(5)).await);

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.request_shutdown();
        });
        let started = tokio::time::Instant::now();
        assert!(!shutdown.sleep(Duration::from_secs(3600)).await);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
