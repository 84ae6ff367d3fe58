// src/services/publish.rs

//! Dataset release publishing.
//!
//! Reads the dataset asset of a tagged release and replaces it with the
//! mapped dataset. The replace is delete-then-upload; the platform offers
//! no atomic swap.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::error::{AppError, Result};
use crate::models::{AlmanaxRecord, NotifyConfig, ReleaseAsset, ensure_unique_receivers};
use crate::storage::ReleaseStore;
use crate::utils::http::{DEFAULT_USER_AGENT, create_client, join_url};

/// Receives a ping once a new dataset is published.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, token: &str, version: &str) -> Result<()>;
}

/// Notification over HTTP: `POST <endpoint>/<token>` with the version.
pub struct UpdateHook {
    client: Client,
    endpoint: String,
}

impl UpdateHook {
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(DEFAULT_USER_AGENT, 30)?,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Notifier for UpdateHook {
    async fn notify(&self, token: &str, version: &str) -> Result<()> {
        let response = self
            .client
            .post(join_url(&self.endpoint, token))
            .json(&json!({ "version": version }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::status("update notification", status.as_u16()));
        }
        Ok(())
    }
}

/// Publisher settings, built once at startup.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Asset read from and written to each release
    pub asset_name: String,
    /// Directory for the serialized dataset before upload
    pub scratch_dir: PathBuf,
    /// Notification is skipped without a token
    pub notify_token: Option<String>,
}

/// Reads and replaces the dataset asset of tagged releases.
pub struct ReleasePublisher {
    store: Arc<dyn ReleaseStore>,
    notifier: Box<dyn Notifier>,
    config: PublisherConfig,
}

impl ReleasePublisher {
    pub fn new(
        store: Arc<dyn ReleaseStore>,
        notifier: Box<dyn Notifier>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Download and decode the dataset attached to the release `version`.
    pub async fn fetch_records(&self, version: &str) -> Result<Vec<AlmanaxRecord>> {
        fetch_dataset(self.store.as_ref(), version, &self.config.asset_name).await
    }

    /// Replace the dataset asset on the release `version`, then notify.
    pub async fn publish(&self, records: &[AlmanaxRecord], version: &str) -> Result<ReleaseAsset> {
        let name = &self.config.asset_name;
        let release = self.store.release_by_tag(version).await?;

        // Removed when dropped, whatever the upload outcome
        let scratch = self.write_scratch(records).await?;

        if let Some(existing) = release.asset(name) {
            log::info!("Deleting previous asset name={} id={}", name, existing.id);
            self.store.delete_asset(existing.id).await?;
        }

        let asset = self
            .store
            .upload_asset(&release, name, scratch.path())
            .await?;
        log::info!("Uploaded asset name={} id={} version={}", asset.name, asset.id, version);

        if let Some(token) = self.config.notify_token.as_deref() {
            self.notifier.notify(token, version).await?;
            log::info!("Update notification sent version={}", version);
        }

        Ok(asset)
    }

    /// Serialize the records to a scratch file in the scratch directory.
    async fn write_scratch(&self, records: &[AlmanaxRecord]) -> Result<NamedTempFile> {
        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        let mut scratch = tempfile::Builder::new()
            .prefix("almanax-")
            .suffix(".json")
            .tempfile_in(&self.config.scratch_dir)?;

        {
            let mut writer = BufWriter::new(scratch.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.flush()?;
        }
        Ok(scratch)
    }
}

/// Download the named dataset asset of a release and check receiver keys.
pub async fn fetch_dataset(
    store: &dyn ReleaseStore,
    version: &str,
    asset_name: &str,
) -> Result<Vec<AlmanaxRecord>> {
    let release = store.release_by_tag(version).await?;
    let asset = release
        .asset(asset_name)
        .ok_or_else(|| AppError::release(format!("{asset_name} missing on release {version}")))?;

    let bytes = store.download_asset(asset).await?;
    let records: Vec<AlmanaxRecord> = serde_json::from_slice(&bytes)?;
    ensure_unique_receivers(&records)?;

    log::info!("Loaded {} almanax records version={}", records.len(), version);
    Ok(records)
}
