//! Release platform data structures.

use serde::{Deserialize, Serialize};

/// A tagged release and its assets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub browser_download_url: String,
}

impl Release {
    /// Find an asset by exact name.
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

/// Body of the meta-version endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaVersion {
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_deserializes_platform_payload() {
        let json = r#"{
            "id": 7,
            "tag_name": "2.71.3.12",
            "upload_url": "https://uploads.example/releases/7/assets{?name,label}",
            "draft": false,
            "assets": [
                {"id": 11, "name": "MAPPED_ALMANAX.json", "label": null,
                 "browser_download_url": "https://dl.example/MAPPED_ALMANAX.json"}
            ]
        }"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.tag_name, "2.71.3.12");
        assert_eq!(release.asset("MAPPED_ALMANAX.json").map(|a| a.id), Some(11));
        assert!(release.asset("missing.json").is_none());
    }
}
