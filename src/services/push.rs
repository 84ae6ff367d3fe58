// src/services/push.rs

//! Pushes localized almanax days to the downstream API.
//!
//! Each date is written once per configured language. The first language is
//! created (falling back to an update when the API reports it exists), the
//! others are updated. Dates whose receiver did not change since the last
//! run are skipped.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};

use crate::error::{AppError, Result};
use crate::models::{AlmanaxApiEntry, AlmanaxRecord, ApiConfig};
use crate::services::ReceiverResolver;
use crate::storage::PushSnapshot;
use crate::utils::http::{DEFAULT_USER_AGENT, create_client};
use crate::utils::jitter_sleep;

/// How an entry is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Downstream almanax API.
#[async_trait]
pub trait AlmanaxApi: Send + Sync {
    /// Write an entry and return the HTTP status.
    async fn write(&self, mode: WriteMode, entry: &AlmanaxApiEntry) -> Result<u16>;
}

/// Almanax API over HTTP with bearer authentication.
pub struct HttpAlmanaxApi {
    client: Client,
    endpoint: String,
    auth_key: String,
}

impl HttpAlmanaxApi {
    pub fn new(config: &ApiConfig, auth_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: create_client(DEFAULT_USER_AGENT, 30)?,
            endpoint: config.endpoint.clone(),
            auth_key: auth_key.into(),
        })
    }
}

#[async_trait]
impl AlmanaxApi for HttpAlmanaxApi {
    async fn write(&self, mode: WriteMode, entry: &AlmanaxApiEntry) -> Result<u16> {
        let method = match mode {
            WriteMode::Create => Method::POST,
            WriteMode::Update => Method::PUT,
        };
        let response = self
            .client
            .request(method, &self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.auth_key))
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(entry)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::debug!("Almanax API answered status={} body={}", status, body);
        }
        Ok(status.as_u16())
    }
}

/// Summary of a push run.
#[derive(Debug, Default)]
pub struct PushOutcome {
    pub snapshot: PushSnapshot,
    pub pushed: usize,
    pub unchanged: usize,
}

/// Writes resolved days to the downstream API.
pub struct AlmanaxPusher {
    api: Box<dyn AlmanaxApi>,
    languages: Vec<String>,
    conflict_status: u16,
    jitter: (Duration, Duration),
}

impl AlmanaxPusher {
    pub fn new(
        api: Box<dyn AlmanaxApi>,
        languages: Vec<String>,
        conflict_status: u16,
        jitter: (Duration, Duration),
    ) -> Self {
        Self {
            api,
            languages,
            conflict_status,
            jitter,
        }
    }

    /// Write one date in every language.
    pub async fn push_day(&self, record: &AlmanaxRecord, date: &str) -> Result<()> {
        let Some((first, rest)) = self.languages.split_first() else {
            return Err(AppError::config("no languages configured"));
        };

        let entry = AlmanaxApiEntry::from_record(record, date, first);
        let status = self.api.write(WriteMode::Create, &entry).await?;
        if status == self.conflict_status {
            log::debug!("Entry exists, updating date={} language={}", date, first);
            self.expect_success(WriteMode::Update, &entry).await?;
        } else if !is_success(status) {
            log::error!("Create failed date={} language={} status={}", date, first, status);
            return Err(AppError::status(format!("create {first} {date}"), status));
        }

        for language in rest {
            let entry = AlmanaxApiEntry::from_record(record, date, language);
            self.expect_success(WriteMode::Update, &entry).await?;
        }
        Ok(())
    }

    async fn expect_success(&self, mode: WriteMode, entry: &AlmanaxApiEntry) -> Result<()> {
        let status = self.api.write(mode, entry).await?;
        if is_success(status) {
            return Ok(());
        }
        log::error!(
            "Update failed date={} language={} status={}",
            entry.date,
            entry.language,
            status
        );
        Err(AppError::status(
            format!("update {} {}", entry.language, entry.date),
            status,
        ))
    }

    /// Resolve and push every date, skipping dates already pushed with the
    /// same receiver in `previous`.
    pub async fn push_range(
        &self,
        resolver: &ReceiverResolver,
        records: &[AlmanaxRecord],
        dates: &[String],
        previous: &PushSnapshot,
    ) -> Result<PushOutcome> {
        let mut outcome = PushOutcome::default();

        for date in dates {
            log::info!("Next date={}", date);
            let receiver = resolver.resolve(date).await?;

            let record = records
                .iter()
                .find(|record| record.offering_receiver == receiver)
                .ok_or_else(|| {
                    log::error!("Could not find offering receiver date={} receiver={:?}", date, receiver);
                    AppError::UnmatchedReceiver {
                        date: date.clone(),
                        receiver: receiver.clone(),
                    }
                })?;
            outcome.snapshot.insert(date.clone(), record.clone());

            let unchanged = previous
                .get(date)
                .is_some_and(|last| last.offering_receiver == receiver);
            if unchanged {
                outcome.unchanged += 1;
                continue;
            }

            log::info!("Pushing date={} receiver={}", date, receiver);
            self.push_day(record, date).await?;
            outcome.pushed += 1;
            jitter_sleep(self.jitter.0, self.jitter.1).await;
        }

        Ok(outcome)
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
