// src/pipeline/push.rs

//! Push mode: resolve a date range and write it to the downstream API.

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::{AlmanaxPusher, HttpAlmanaxApi, PushOutcome, ReceiverResolver, fetch_dataset};
use crate::storage::{GithubReleases, LocalStorage, ReleaseStore};
use crate::utils::{date_range, is_date};

/// Range and snapshot name of one push run.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub from: String,
    pub to: String,
    /// Suffix of the snapshot file, one per deployment
    pub appendix: String,
}

impl PushRequest {
    /// Check both bounds and expand them into the dates to push.
    pub fn dates(&self) -> Result<Vec<String>> {
        for bound in [&self.from, &self.to] {
            if !is_date(bound) {
                return Err(AppError::date(format!("'{bound}' is not a YYYY-MM-DD date")));
            }
        }
        date_range(&self.from, &self.to)
    }
}

/// Push a range using already built collaborators.
///
/// The dataset comes from the latest release. The snapshot is only
/// written once every date went through.
pub async fn run_push_with(
    store: &dyn ReleaseStore,
    asset_name: &str,
    resolver: &ReceiverResolver,
    pusher: &AlmanaxPusher,
    storage: &LocalStorage,
    request: &PushRequest,
) -> Result<PushOutcome> {
    let dates = request.dates()?;
    let previous = storage.load_snapshot(&request.appendix).await?;
    log::info!(
        "Push started from={} to={} days={} known={}",
        request.from,
        request.to,
        dates.len(),
        previous.len()
    );

    let tag = store.latest_tag().await?;
    let records = fetch_dataset(store, &tag, asset_name).await?;

    let outcome = pusher
        .push_range(resolver, &records, &dates, &previous)
        .await?;
    storage
        .save_snapshot(&request.appendix, &outcome.snapshot)
        .await?;

    log::info!(
        "Push finished version={} pushed={} unchanged={}",
        tag,
        outcome.pushed,
        outcome.unchanged
    );
    Ok(outcome)
}

/// Push a range against the configured services.
pub async fn run_push(config: &Config, request: &PushRequest) -> Result<PushOutcome> {
    config.validate()?;
    let auth_key = config
        .api
        .auth_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AppError::config("almanax API key missing (set ALMANAX_API_KEY or --auth-key)"))?;

    let store = GithubReleases::new(&config.release)?;
    let resolver = ReceiverResolver::from_config(&config.resolver)?;
    let pusher = AlmanaxPusher::new(
        Box::new(HttpAlmanaxApi::new(&config.api, auth_key)?),
        config.api.languages.clone(),
        config.api.conflict_status,
        config.resolver.jitter(),
    );
    let storage = LocalStorage::new(config.work_dir.clone());

    run_push_with(
        &store,
        &config.release.asset_name,
        &resolver,
        &pusher,
        &storage,
        request,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(from: &str, to: &str) -> PushRequest {
        PushRequest {
            from: from.into(),
            to: to.into(),
            appendix: "test".into(),
        }
    }

    #[test]
    fn test_request_dates_inclusive() {
        assert_eq!(
            request("2024-02-28", "2024-03-01").dates().unwrap(),
            vec!["2024-02-28", "2024-02-29", "2024-03-01"]
        );
    }

    #[test]
    fn test_request_rejects_malformed_bounds() {
        assert!(matches!(
            request("2024-6-1", "2024-06-03").dates(),
            Err(AppError::Date(_))
        ));
        assert!(matches!(
            request("2024-06-01", "tomorrow").dates(),
            Err(AppError::Date(_))
        ));
    }

    #[tokio::test]
    async fn test_run_push_requires_api_key() {
        let mut config = Config::default();
        config.api.auth_key = Some("  ".into());

        let err = run_push(&config, &request("2024-06-01", "2024-06-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
