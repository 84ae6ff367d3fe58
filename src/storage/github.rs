//! GitHub releases backend.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::error::{AppError, Result};
use crate::models::{Release, ReleaseAsset, ReleaseConfig};
use crate::storage::ReleaseStore;
use crate::utils::http::{DEFAULT_USER_AGENT, create_client};

const API_ACCEPT: &str = "application/vnd.github+json";

/// Release assets of one GitHub repository.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: Client,
    api_base: String,
    uploads_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl GithubReleases {
    /// Create a backend from the release configuration.
    pub fn new(config: &ReleaseConfig) -> Result<Self> {
        let client = create_client(DEFAULT_USER_AGENT, config.timeout_secs)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ReleaseConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            uploads_base: config.uploads_base.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token: config.token.clone(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.header(AUTHORIZATION, format!("Bearer {}", self.token))
        }
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            log::error!("Release platform answered {} for {}", status, context);
            Err(AppError::status(context, status.as_u16()))
        }
    }
}

#[async_trait]
impl ReleaseStore for GithubReleases {
    async fn latest_tag(&self) -> Result<String> {
        let request = self
            .client
            .get(self.repo_url("releases/latest"))
            .header(ACCEPT, API_ACCEPT);
        let release: Release = self.send(request, "latest release").await?.json().await?;
        Ok(release.tag_name)
    }

    async fn release_by_tag(&self, tag: &str) -> Result<Release> {
        let request = self
            .client
            .get(self.repo_url(&format!("releases/tags/{tag}")))
            .header(ACCEPT, API_ACCEPT);

        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::release(format!("no release tagged {tag}")));
        }
        if !response.status().is_success() {
            return Err(AppError::status(
                format!("release {tag}"),
                response.status().as_u16(),
            ));
        }
        Ok(response.json().await?)
    }

    async fn download_asset(&self, asset: &ReleaseAsset) -> Result<Vec<u8>> {
        let request = self
            .client
            .get(self.repo_url(&format!("releases/assets/{}", asset.id)))
            .header(ACCEPT, "application/octet-stream");
        let context = format!("download of {}", asset.name);
        let bytes = self.send(request, &context).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn delete_asset(&self, asset_id: u64) -> Result<()> {
        let request = self
            .client
            .delete(self.repo_url(&format!("releases/assets/{asset_id}")))
            .header(ACCEPT, API_ACCEPT);
        self.send(request, &format!("delete of asset {asset_id}"))
            .await?;
        Ok(())
    }

    async fn upload_asset(
        &self,
        release: &Release,
        name: &str,
        path: &Path,
    ) -> Result<ReleaseAsset> {
        let body = tokio::fs::read(path).await?;
        let url = format!(
            "{}/repos/{}/{}/releases/{}/assets",
            self.uploads_base, self.owner, self.repo, release.id
        );
        let request = self
            .client
            .post(url)
            .query(&[("name", name), ("label", name)])
            .header(ACCEPT, API_ACCEPT)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let asset: ReleaseAsset = self
            .send(request, &format!("upload of {name}"))
            .await?
            .json()
            .await?;
        Ok(asset)
    }
}
