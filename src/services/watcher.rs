// src/services/watcher.rs

//! Dataset version watcher.
//!
//! Polls the meta endpoint on a fixed interval and emits the new version on
//! a channel whenever it differs from the locally persisted marker. The
//! consumer pauses the watcher (`false` on the readiness channel) while it
//! works on a version and resumes it (`true`) afterwards.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::{AppError, Result};
use crate::models::{MetaVersion, WatcherConfig};
use crate::shutdown::SharedShutdown;
use crate::storage::LocalStorage;
use crate::utils::http::{DEFAULT_USER_AGENT, create_client};

/// Source of the current upstream dataset version.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn current_version(&self) -> Result<String>;
}

/// Meta endpoint answering `{"version": "..."}`.
pub struct MetaEndpoint {
    client: Client,
    url: String,
}

impl MetaEndpoint {
    pub fn new(config: &WatcherConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(DEFAULT_USER_AGENT, 30)?,
            url: config.meta_url.clone(),
        })
    }
}

#[async_trait]
impl VersionSource for MetaEndpoint {
    async fn current_version(&self) -> Result<String> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AppError::status("meta version", status.as_u16()));
        }
        let meta: MetaVersion = response.json().await?;
        Ok(meta.version)
    }
}

/// Whether ticks trigger a version check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Polling,
    Paused,
}

/// Polls for dataset version changes.
pub struct VersionWatcher {
    source: Box<dyn VersionSource>,
    storage: LocalStorage,
    interval: Duration,
    state: WatchState,
}

impl VersionWatcher {
    pub fn new(source: Box<dyn VersionSource>, storage: LocalStorage, interval: Duration) -> Self {
        Self {
            source,
            storage,
            interval,
            state: WatchState::Polling,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Compare the remote version with the local marker.
    ///
    /// On a difference the marker is overwritten before the new version is
    /// returned, so each transition is reported once.
    pub async fn check(&self) -> Result<Option<String>> {
        let remote = self.source.current_version().await?;
        let local = self.storage.read_version().await?;

        if remote == local {
            log::debug!("Dataset unchanged version={}", remote);
            return Ok(None);
        }

        log::info!("Dataset version changed old={:?} new={}", local, remote);
        self.storage.write_version(&remote).await?;
        Ok(Some(remote))
    }

    /// Run the polling loop until shutdown or until the consumer goes away.
    ///
    /// Errors from the version source or the marker file end the loop.
    pub async fn run(
        mut self,
        changes: mpsc::Sender<String>,
        mut ready: mpsc::Receiver<bool>,
        shutdown: SharedShutdown,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("Watching dataset version every {:?}", self.interval);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => {
                    log::info!("Version watcher stopping");
                    return Ok(());
                }

                Some(is_ready) = ready.recv() => {
                    self.state = if is_ready { WatchState::Polling } else { WatchState::Paused };
                    log::debug!("Version watcher state={:?}", self.state);
                }

                _ = ticker.tick() => {
                    if self.state == WatchState::Paused {
                        continue;
                    }
                    let Some(version) = self.check().await? else {
                        continue;
                    };
                    tokio::select! {
                        _ = shutdown.wait() => return Ok(()),
                        sent = changes.send(version) => {
                            if sent.is_err() {
                                log::info!("Version consumer gone, watcher stopping");
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::shutdown::Shutdown;

    #[derive(Clone)]
    struct FakeMeta {
        version: Arc<Mutex<String>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeMeta {
        fn new(version: &str) -> Self {
            Self {
                version: Arc::new(Mutex::new(version.to_string())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn set(&self, version: &str) {
            *self.version.lock().unwrap() = version.to_string();
        }
    }

    #[async_trait]
    impl VersionSource for FakeMeta {
        async fn current_version(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.version.lock().unwrap().clone())
        }
    }

    struct BrokenMeta;

    #[async_trait]
    impl VersionSource for BrokenMeta {
        async fn current_version(&self) -> Result<String> {
            Err(AppError::status("meta version", 503))
        }
    }

    const TICK: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_check_without_marker_reports_change() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let watcher = VersionWatcher::new(Box::new(FakeMeta::new("v1")), storage.clone(), TICK);
        assert_eq!(watcher.state(), WatchState::Polling);

        assert_eq!(watcher.check().await.unwrap(), Some("v1".to_string()));
        assert_eq!(storage.read_version().await.unwrap(), "v1");
        assert_eq!(watcher.check().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_emits_new_version_once() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let meta = FakeMeta::new("v1");
        let watcher = VersionWatcher::new(Box::new(meta.clone()), storage.clone(), TICK);

        let (changes_tx, mut changes_rx) = mpsc::channel(1);
        let (_ready_tx, ready_rx) = mpsc::channel(1);
        let shutdown = Shutdown::shared();
        let handle = tokio::spawn(watcher.run(changes_tx, ready_rx, Arc::clone(&shutdown)));

        assert_eq!(changes_rx.recv().await.as_deref(), Some("v1"));
        assert_eq!(storage.read_version().await.unwrap(), "v1");

        // Further ticks on the same version stay silent
        let silent = tokio::time::timeout(TICK * 5, changes_rx.recv()).await;
        assert!(silent.is_err());
        assert!(meta.calls.load(Ordering::SeqCst) >= 5);

        meta.set("v2");
        assert_eq!(changes_rx.recv().await.as_deref(), Some("v2"));

        shutdown.request();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_watcher_does_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.write_version("v1").await.unwrap();
        let meta = FakeMeta::new("v1");
        let watcher = VersionWatcher::new(Box::new(meta.clone()), storage.clone(), TICK);

        let (changes_tx, mut changes_rx) = mpsc::channel(1);
        let (ready_tx, ready_rx) = mpsc::channel(1);
        let shutdown = Shutdown::shared();
        let handle = tokio::spawn(watcher.run(changes_tx, ready_rx, Arc::clone(&shutdown)));

        ready_tx.send(false).await.unwrap();
        // Let the watcher observe the pause
        tokio::time::sleep(Duration::from_millis(1)).await;
        let calls_when_paused = meta.calls.load(Ordering::SeqCst);

        meta.set("v2");
        let silent = tokio::time::timeout(TICK * 3, changes_rx.recv()).await;
        assert!(silent.is_err());
        assert_eq!(meta.calls.load(Ordering::SeqCst), calls_when_paused);
        assert_eq!(storage.read_version().await.unwrap(), "v1");

        ready_tx.send(true).await.unwrap();
        assert_eq!(changes_rx.recv().await.as_deref(), Some("v2"));

        shutdown.request();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_paused_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.write_version("v1").await.unwrap();
        let watcher = VersionWatcher::new(Box::new(FakeMeta::new("v1")), storage, TICK);

        let (changes_tx, _changes_rx) = mpsc::channel(1);
        let (ready_tx, ready_rx) = mpsc::channel(1);
        let shutdown = Shutdown::shared();
        let handle = tokio::spawn(watcher.run(changes_tx, ready_rx, Arc::clone(&shutdown)));

        ready_tx.send(false).await.unwrap();
        tokio::time::sleep(TICK * 2).await;
        shutdown.request();

        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_ends_loop() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = VersionWatcher::new(Box::new(BrokenMeta), LocalStorage::new(dir.path()), TICK);

        let (changes_tx, mut changes_rx) = mpsc::channel(1);
        let (_ready_tx, ready_rx) = mpsc::channel(1);
        let result = watcher.run(changes_tx, ready_rx, Shutdown::shared()).await;

        assert!(matches!(
            result,
            Err(AppError::UnexpectedStatus { status: 503, .. })
        ));
        assert!(changes_rx.recv().await.is_none());
    }
}
