//! Local filesystem storage.
//!
//! ## Storage Layout
//!
//! ```text
//! {work_dir}/
//! ├── version                   # Last detected dataset version
//! └── alm-prev-{appendix}.json  # Push mode: date -> record snapshot
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::AlmanaxRecord;

/// File holding the last detected dataset version.
pub const VERSION_FILE: &str = "version";

/// Records pushed per date during a previous push run.
pub type PushSnapshot = BTreeMap<String, AlmanaxRecord>;

/// Local filesystem storage backend rooted at the working directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write_bytes(key, &bytes).await
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read the persisted version marker.
    ///
    /// A missing file reads as an empty version.
    pub async fn read_version(&self) -> Result<String> {
        let bytes = self.read_bytes(VERSION_FILE).await?.unwrap_or_default();
        let text = String::from_utf8(bytes)
            .map_err(|e| AppError::validation(format!("version file is not UTF-8: {e}")))?;
        Ok(text.trim().to_string())
    }

    /// Overwrite the persisted version marker.
    pub async fn write_version(&self, version: &str) -> Result<()> {
        self.write_bytes(VERSION_FILE, version.as_bytes()).await
    }

    fn snapshot_key(appendix: &str) -> String {
        format!("alm-prev-{appendix}.json")
    }

    /// Load the push snapshot of a previous run, empty if none exists.
    pub async fn load_snapshot(&self, appendix: &str) -> Result<PushSnapshot> {
        Ok(self
            .read_json(&Self::snapshot_key(appendix))
            .await?
            .unwrap_or_default())
    }

    /// Persist the push snapshot of this run.
    pub async fn save_snapshot(&self, appendix: &str, snapshot: &PushSnapshot) -> Result<()> {
        self.write_json(&Self::snapshot_key(appendix), snapshot)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_version_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert_eq!(storage.read_version().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_version_roundtrip_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested"));

        storage.write_version("v1").await.unwrap();
        storage.write_version("v2").await.unwrap();

        assert_eq!(storage.read_version().await.unwrap(), "v2");
        assert!(storage.root().join(VERSION_FILE).is_file());
        let raw = std::fs::read_to_string(dir.path().join("nested").join(VERSION_FILE)).unwrap();
        assert_eq!(raw, "v2");
        assert!(!dir.path().join("nested").join("version.tmp").exists());
    }

    #[tokio::test]
    async fn test_version_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "2.71.3\n").unwrap();
        let storage = LocalStorage::new(dir.path());
        assert_eq!(storage.read_version().await.unwrap(), "2.71.3");
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.load_snapshot("en").await.unwrap().is_empty());

        let mut snapshot = PushSnapshot::new();
        snapshot.insert(
            "2024-06-01".into(),
            AlmanaxRecord {
                offering_receiver: "Anicotil".into(),
                ..Default::default()
            },
        );
        storage.save_snapshot("en", &snapshot).await.unwrap();

        assert!(dir.path().join("alm-prev-en.json").exists());
        let loaded = storage.load_snapshot("en").await.unwrap();
        assert_eq!(loaded["2024-06-01"].offering_receiver, "Anicotil");
    }
}
