// src/pipeline/watch.rs

//! Watch mode: the version watcher task plus the mapping consumer loop.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::models::{Config, ReleaseAsset};
use crate::services::{
    MappingReconciler, MetaEndpoint, PublisherConfig, ReceiverResolver, ReleasePublisher,
    UpdateHook, VersionWatcher,
};
use crate::shutdown::SharedShutdown;
use crate::storage::{GithubReleases, LocalStorage, ReleaseStore};

/// One fetch, reconcile and publish pass for a dataset version.
pub struct MappingCycle {
    reconciler: MappingReconciler,
    publisher: ReleasePublisher,
}

impl MappingCycle {
    pub fn new(reconciler: MappingReconciler, publisher: ReleasePublisher) -> Self {
        Self {
            reconciler,
            publisher,
        }
    }

    /// Wire the cycle against the configured remote services.
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = ReceiverResolver::from_config(&config.resolver)?;
        let reconciler =
            MappingReconciler::new(resolver, config.horizon()?, config.resolver.jitter());

        let store: Arc<dyn ReleaseStore> = Arc::new(GithubReleases::new(&config.release)?);
        let publisher = ReleasePublisher::new(
            store,
            Box::new(UpdateHook::new(&config.notify)?),
            PublisherConfig {
                asset_name: config.release.asset_name.clone(),
                scratch_dir: config.work_dir.clone(),
                notify_token: config.notify.token.clone(),
            },
        );

        Ok(Self::new(reconciler, publisher))
    }

    pub async fn run(&self, version: &str, today: NaiveDate) -> Result<ReleaseAsset> {
        log::info!("Mapping cycle started version={} today={}", version, today);

        let records = self.publisher.fetch_records(version).await?;
        let outcome = self.reconciler.reconcile(records, today).await?;
        if outcome.already_mapped {
            log::info!("Version {} already carries days, republishing as is", version);
        } else {
            log::info!("Mapped {} days version={}", outcome.mapped_days, version);
        }

        let asset = self.publisher.publish(&outcome.records, version).await?;
        log::info!("Mapping cycle finished version={}", version);
        Ok(asset)
    }
}

/// Consume version changes until the watcher closes the channel.
///
/// The watcher is paused for the whole cycle and resumed afterwards. A
/// failed cycle ends the loop with its error.
pub async fn consume(
    cycle: &MappingCycle,
    mut changes: mpsc::Receiver<String>,
    ready: mpsc::Sender<bool>,
    today: impl Fn() -> NaiveDate,
) -> Result<()> {
    while let Some(version) = changes.recv().await {
        if ready.send(false).await.is_err() {
            log::debug!("Version watcher gone before pause");
        }

        cycle.run(&version, today()).await?;

        if ready.send(true).await.is_err() {
            log::debug!("Version watcher gone before resume");
        }
    }
    Ok(())
}

/// Run the watcher and the consumer until shutdown or the first failure.
pub async fn run_watch_with(
    watcher: VersionWatcher,
    cycle: &MappingCycle,
    shutdown: SharedShutdown,
    today: impl Fn() -> NaiveDate,
) -> Result<()> {
    let (changes_tx, changes_rx) = mpsc::channel(1);
    let (ready_tx, ready_rx) = mpsc::channel(1);

    let handle = tokio::spawn(watcher.run(changes_tx, ready_rx, Arc::clone(&shutdown)));
    let consumed = consume(cycle, changes_rx, ready_tx, today).await;
    if consumed.is_err() {
        shutdown.request();
    }

    let watched = handle.await.map_err(AppError::task)?;
    consumed?;
    watched
}

/// Watch the configured meta endpoint and map every new version.
pub async fn run_watch(config: &Config, shutdown: SharedShutdown) -> Result<()> {
    config.validate_for_publish()?;

    let cycle = MappingCycle::from_config(config)?;
    let watcher = VersionWatcher::new(
        Box::new(MetaEndpoint::new(&config.watcher)?),
        LocalStorage::new(config.work_dir.clone()),
        config.poll_interval()?,
    );

    run_watch_with(watcher, &cycle, shutdown, || {
        chrono::Local::now().date_naive()
    })
    .await
}

/// Map a single version once, leaving the version marker alone.
pub async fn run_map(config: &Config, version: &str) -> Result<ReleaseAsset> {
    config.validate_for_publish()?;

    let cycle = MappingCycle::from_config(config)?;
    cycle.run(version, chrono::Local::now().date_naive()).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::AlmanaxRecord;
    use crate::services::PageFetch;
    use crate::services::publish::tests::{MemoryReleases, RecordingNotifier};
    use crate::services::receiver::tests::{ScriptedPages, page_for};
    use crate::utils::parse_duration;

    const ASSET: &str = "MAPPED_ALMANAX.json";

    fn record(name: &str) -> AlmanaxRecord {
        AlmanaxRecord {
            offering_receiver: name.into(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn cycle(store: Arc<MemoryReleases>, scratch: &std::path::Path) -> MappingCycle {
        let resolver = ReceiverResolver::new(
            Box::new(ScriptedPages::new(vec![], |date| {
                PageFetch::Page(page_for(if date == "2024-06-02" { "Brumaire" } else { "Anicotil" }))
            })),
            Duration::from_secs(60),
        )
        .unwrap();
        let reconciler = MappingReconciler::new(
            resolver,
            parse_duration("1d").unwrap(),
            (Duration::from_millis(10), Duration::from_millis(20)),
        );
        let publisher = ReleasePublisher::new(
            store,
            Box::new(RecordingNotifier::default()),
            PublisherConfig {
                asset_name: ASSET.into(),
                scratch_dir: scratch.to_path_buf(),
                notify_token: None,
            },
        );
        MappingCycle::new(reconciler, publisher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_maps_and_republishes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryReleases::with_dataset(
            "v2",
            ASSET,
            &[record("Anicotil"), record("Brumaire")],
        ));
        let cycle = cycle(Arc::clone(&store), dir.path());

        let asset = cycle.run("v2", today()).await.unwrap();
        assert_eq!(asset.name, ASSET);

        let published = store.uploaded_records("v2", ASSET);
        assert_eq!(published[0].days, vec!["2024-06-01"]);
        assert_eq!(published[1].days, vec!["2024-06-02"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_pauses_around_each_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryReleases::with_dataset("v2", ASSET, &[record("Anicotil"), record("Brumaire")]));
        let cycle = cycle(store, dir.path());

        let (changes_tx, changes_rx) = mpsc::channel(1);
        let (ready_tx, mut ready_rx) = mpsc::channel(4);
        changes_tx.send("v2".to_string()).await.unwrap();
        drop(changes_tx);

        consume(&cycle, changes_rx, ready_tx, today).await.unwrap();

        assert_eq!(ready_rx.recv().await, Some(false));
        assert_eq!(ready_rx.recv().await, Some(true));
        assert_eq!(ready_rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_stops_on_failed_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryReleases::with_dataset("v2", ASSET, &[record("Anicotil")]));
        let cycle = cycle(store, dir.path());

        let (changes_tx, changes_rx) = mpsc::channel(1);
        let (ready_tx, mut ready_rx) = mpsc::channel(4);
        changes_tx.send("v2".to_string()).await.unwrap();

        let err = consume(&cycle, changes_rx, ready_tx, today).await.unwrap_err();
        assert!(matches!(err, AppError::UnmatchedReceiver { .. }));

        // Paused, never resumed
        assert_eq!(ready_rx.recv().await, Some(false));
        assert_eq!(ready_rx.recv().await, None);
    }
}
