//! Storage abstractions.
//!
//! - `LocalStorage`: version marker and push snapshots in the working directory
//! - `ReleaseStore`: assets attached to tagged releases on the hosting platform
//!
//! Release assets have no atomic replace: publishing deletes the old asset
//! and uploads the new one, so a crash in between leaves the release without
//! the asset until the next successful publish.

pub mod github;
pub mod local;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Release, ReleaseAsset};

// Re-export for convenience
pub use github::GithubReleases;
pub use local::{LocalStorage, PushSnapshot};

/// Trait for release hosting backends.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Tag of the most recent release.
    async fn latest_tag(&self) -> Result<String>;

    /// Look up a release and its assets by tag.
    async fn release_by_tag(&self, tag: &str) -> Result<Release>;

    /// Download the content of an asset.
    async fn download_asset(&self, asset: &ReleaseAsset) -> Result<Vec<u8>>;

    /// Delete an asset by id.
    async fn delete_asset(&self, asset_id: u64) -> Result<()>;

    /// Upload a file as a new JSON asset named `name`.
    async fn upload_asset(&self, release: &Release, name: &str, path: &Path)
    -> Result<ReleaseAsset>;
}
