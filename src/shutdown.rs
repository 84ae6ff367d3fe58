//! Process-wide cancellation.
//!
//! A [`Shutdown`] handle is shared between the version watcher and the
//! Ctrl+C listener. Requesting shutdown wakes every waiter exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<Shutdown>;

/// Coordinates cancellation across async tasks.
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown.
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.is_requested() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_request() {
        let shutdown = Shutdown::shared();
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.request();

        waiter.await.unwrap();
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_wait_after_request_is_immediate() {
        let shutdown = Shutdown::new();
        shutdown.request();
        shutdown.request();
        shutdown.wait().await;
        assert!(shutdown.is_requested());
    }
}
