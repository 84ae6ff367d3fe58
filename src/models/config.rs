//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::{parse_duration, parse_interval};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Working directory for the version marker and push snapshots
    #[serde(default = "defaults::work_dir")]
    pub work_dir: PathBuf,

    /// Forward window resolved on each mapping pass (e.g. `"1y"`)
    #[serde(default = "defaults::mapping_horizon")]
    pub mapping_horizon: String,

    /// Dataset version polling
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Release hosting platform
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Offering receiver lookup
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Update notification after publishing
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Downstream almanax API used by the push mode
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(token) = non_empty("GH_TOKEN") {
            self.release.token = token;
        }
        if let Some(token) = non_empty("UPDATE_HOOK_TOKEN") {
            self.notify.token = Some(token);
        }
        if let Some(interval) = non_empty("POLL_INTERVAL") {
            self.watcher.poll_interval = interval;
        }
        if let Some(horizon) = non_empty("MAPPING_HORIZON") {
            self.mapping_horizon = horizon;
        }
        if let Some(key) = non_empty("ALMANAX_API_KEY") {
            self.api.auth_key = Some(key);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.poll_interval()?;
        self.horizon()?;
        if self.resolver.user_agent.trim().is_empty() {
            return Err(AppError::validation("resolver.user_agent is empty"));
        }
        if self.resolver.retry_cooldown_secs == 0 {
            return Err(AppError::validation(
                "resolver.retry_cooldown_secs must be > 0",
            ));
        }
        if self.resolver.jitter_min_ms > self.resolver.jitter_max_ms {
            return Err(AppError::validation(
                "resolver.jitter_min_ms must not exceed resolver.jitter_max_ms",
            ));
        }
        if self.resolver.timeout_secs == 0 {
            return Err(AppError::validation("resolver.timeout_secs must be > 0"));
        }
        if self.release.asset_name.trim().is_empty() {
            return Err(AppError::validation("release.asset_name is empty"));
        }
        if self.api.languages.is_empty() {
            return Err(AppError::validation("api.languages is empty"));
        }
        for (name, value) in [
            ("watcher.meta_url", &self.watcher.meta_url),
            ("release.api_base", &self.release.api_base),
            ("release.uploads_base", &self.release.uploads_base),
            ("resolver.base_url", &self.resolver.base_url),
            ("notify.endpoint", &self.notify.endpoint),
            ("api.endpoint", &self.api.endpoint),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::validation(format!("{name} '{value}': {e}")))?;
        }
        Ok(())
    }

    /// Validate and additionally require the release platform token.
    pub fn validate_for_publish(&self) -> Result<()> {
        self.validate()?;
        if self.release.token.trim().is_empty() {
            return Err(AppError::config(
                "release token missing (set GH_TOKEN or release.token)",
            ));
        }
        Ok(())
    }

    /// Interval between two version checks.
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_interval(&self.watcher.poll_interval)
    }

    /// Length of the forward mapping window.
    pub fn horizon(&self) -> Result<chrono::Duration> {
        parse_duration(&self.mapping_horizon)
    }

    /// Path of the persisted version marker.
    pub fn version_file(&self) -> PathBuf {
        self.work_dir.join("version")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: defaults::work_dir(),
            mapping_horizon: defaults::mapping_horizon(),
            watcher: WatcherConfig::default(),
            release: ReleaseConfig::default(),
            resolver: ResolverConfig::default(),
            notify: NotifyConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// Dataset version polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Endpoint answering `{"version": "..."}`
    #[serde(default = "defaults::meta_url")]
    pub meta_url: String,

    /// Poll interval, e.g. `"1m"`
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            meta_url: defaults::meta_url(),
            poll_interval: defaults::poll_interval(),
        }
    }
}

/// Release hosting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    #[serde(default = "defaults::owner")]
    pub owner: String,

    #[serde(default = "defaults::repo")]
    pub repo: String,

    /// Name of the dataset asset, read and replaced on each release
    #[serde(default = "defaults::asset_name")]
    pub asset_name: String,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    #[serde(default = "defaults::uploads_base")]
    pub uploads_base: String,

    /// Access token for the release platform
    #[serde(default)]
    pub token: String,

    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            owner: defaults::owner(),
            repo: defaults::repo(),
            asset_name: defaults::asset_name(),
            api_base: defaults::api_base(),
            uploads_base: defaults::uploads_base(),
            token: String::new(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Offering receiver lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Page base, the date is appended as a path segment
    #[serde(default = "defaults::page_base")]
    pub base_url: String,

    #[serde(default = "defaults::game")]
    pub game: String,

    /// Browser-like User-Agent, the page source rejects bots
    #[serde(default = "defaults::browser_user_agent")]
    pub user_agent: String,

    /// Fixed wait before retrying the same date
    #[serde(default = "defaults::retry_cooldown")]
    pub retry_cooldown_secs: u64,

    #[serde(default = "defaults::jitter_min")]
    pub jitter_min_ms: u64,

    #[serde(default = "defaults::jitter_max")]
    pub jitter_max_ms: u64,

    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl ResolverConfig {
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_secs(self.retry_cooldown_secs)
    }

    pub fn jitter(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.jitter_min_ms),
            Duration::from_millis(self.jitter_max_ms),
        )
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::page_base(),
            game: defaults::game(),
            user_agent: defaults::browser_user_agent(),
            retry_cooldown_secs: defaults::retry_cooldown(),
            jitter_min_ms: defaults::jitter_min(),
            jitter_max_ms: defaults::jitter_max(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Update notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "defaults::notify_endpoint")]
    pub endpoint: String,

    /// No notification is sent without a token
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::notify_endpoint(),
            token: None,
        }
    }
}

/// Downstream almanax API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "defaults::api_endpoint")]
    pub endpoint: String,

    /// First entry is created, the others are updated
    #[serde(default = "defaults::languages")]
    pub languages: Vec<String>,

    /// Status the API answers when the entry already exists
    #[serde(default = "defaults::conflict_status")]
    pub conflict_status: u16,

    #[serde(default)]
    pub auth_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::api_endpoint(),
            languages: defaults::languages(),
            conflict_status: defaults::conflict_status(),
            auth_key: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn work_dir() -> PathBuf {
        PathBuf::from(".")
    }
    pub fn mapping_horizon() -> String {
        "1y".into()
    }

    // Watcher defaults
    pub fn meta_url() -> String {
        "https://api.dofusdu.de/dofus2/meta/version".into()
    }
    pub fn poll_interval() -> String {
        "1m".into()
    }

    // Release defaults
    pub fn owner() -> String {
        "dofusdude".into()
    }
    pub fn repo() -> String {
        "dofus2-main".into()
    }
    pub fn asset_name() -> String {
        "MAPPED_ALMANAX.json".into()
    }
    pub fn api_base() -> String {
        "https://api.github.com".into()
    }
    pub fn uploads_base() -> String {
        "https://uploads.github.com".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Resolver defaults
    pub fn page_base() -> String {
        "https://www.krosmoz.com/en/almanax".into()
    }
    pub fn game() -> String {
        "dofus".into()
    }
    pub fn browser_user_agent() -> String {
        "Mozilla/5.0 (Windows NT 6.1; rv:2.0b7) Gecko/20100101 Firefox/4.0b7".into()
    }
    pub fn retry_cooldown() -> u64 {
        60
    }
    pub fn jitter_min() -> u64 {
        1000
    }
    pub fn jitter_max() -> u64 {
        2000
    }

    // Downstream defaults
    pub fn notify_endpoint() -> String {
        "https://api.dofusdu.de/dofus2/update".into()
    }
    pub fn api_endpoint() -> String {
        "https://alm.dofusdu.de/dofus2/almanax".into()
    }
    pub fn languages() -> Vec<String> {
        ["en", "de", "fr", "es", "it"]
            .into_iter()
            .map(String::from)
            .collect()
    }
    pub fn conflict_status() -> u16 {
        406
    }
}
