// src/services/receiver.rs

//! Offering receiver lookup.
//!
//! Resolves the NPC receiving the offering on a given date by scraping the
//! public almanax page for that date.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::ResolverConfig;
use crate::utils::http::{create_client, join_url};

/// Text pattern carrying the receiver name on the bonus quest block.
const RECEIVER_PATTERN: &str = r"Quest: Offering for (\w+)";

/// Paragraphs of the daily quest block.
const QUEST_SCOPE: &str = "#achievement_dofus p";

/// Fallback when the quest block is absent.
const PAGE_SCOPE: &str = "p";

/// Outcome of one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFetch {
    /// Page body for the date
    Page(String),
    /// Accepted but not published yet (HTTP 202)
    NotReady,
    /// Any other non-success status
    Status(u16),
    /// The request never got an answer
    Unreachable(String),
}

/// Source of almanax pages keyed by date.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, date: &str) -> PageFetch;
}

/// Almanax pages fetched over HTTP.
pub struct AlmanaxPages {
    client: Client,
    base_url: String,
    game: String,
}

impl AlmanaxPages {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let client = create_client(&config.user_agent, config.timeout_secs)?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            game: config.game.clone(),
        })
    }

    fn page_url(&self, date: &str) -> String {
        join_url(&self.base_url, date)
    }
}

#[async_trait]
impl PageSource for AlmanaxPages {
    async fn fetch(&self, date: &str) -> PageFetch {
        let response = match self
            .client
            .get(self.page_url(date))
            .query(&[("game", self.game.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return PageFetch::Unreachable(e.to_string()),
        };

        if let Some(outcome) = non_page_status(response.status()) {
            return outcome;
        }

        match response.text().await {
            Ok(body) => PageFetch::Page(body),
            Err(e) => PageFetch::Unreachable(e.to_string()),
        }
    }
}

/// Outcome for any status that does not carry a page. Only 200 does.
fn non_page_status(status: StatusCode) -> Option<PageFetch> {
    match status {
        StatusCode::OK => None,
        StatusCode::ACCEPTED => Some(PageFetch::NotReady),
        other => Some(PageFetch::Status(other.as_u16())),
    }
}

/// Resolves dates to offering receivers, retrying until the page is there.
pub struct ReceiverResolver {
    source: Box<dyn PageSource>,
    cooldown: Duration,
    pattern: Regex,
    scope: Selector,
    fallback: Selector,
}

impl ReceiverResolver {
    /// Create a resolver retrying after `cooldown`.
    pub fn new(source: Box<dyn PageSource>, cooldown: Duration) -> Result<Self> {
        let pattern = Regex::new(RECEIVER_PATTERN)
            .map_err(|e| AppError::config(format!("receiver pattern: {e}")))?;
        let scope = Selector::parse(QUEST_SCOPE)
            .map_err(|e| AppError::selector(QUEST_SCOPE, format!("{e:?}")))?;
        let fallback = Selector::parse(PAGE_SCOPE)
            .map_err(|e| AppError::selector(PAGE_SCOPE, format!("{e:?}")))?;

        Ok(Self {
            source,
            cooldown,
            pattern,
            scope,
            fallback,
        })
    }

    /// Create a resolver backed by the configured almanax pages.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Self::new(
            Box::new(AlmanaxPages::new(config)?),
            config.retry_cooldown(),
        )
    }

    /// Resolve the offering receiver of a date.
    ///
    /// Transport failures and not-yet-published pages are retried on the
    /// same date after a fixed cooldown, without limit. Any other HTTP
    /// failure is returned as an error. A page without the quest text
    /// resolves to an empty name.
    pub async fn resolve(&self, date: &str) -> Result<String> {
        loop {
            match self.source.fetch(date).await {
                PageFetch::Page(body) => return Ok(self.extract_receiver(&body)),
                PageFetch::NotReady => {
                    log::warn!(
                        "Almanax not published yet, retrying in {:?} date={}",
                        self.cooldown,
                        date
                    );
                }
                PageFetch::Unreachable(message) => {
                    log::warn!(
                        "Almanax page unreachable, retrying in {:?} date={} error={}",
                        self.cooldown,
                        date,
                        message
                    );
                }
                PageFetch::Status(status) => {
                    log::error!("Almanax page failed date={} status={}", date, status);
                    return Err(AppError::status(format!("almanax page {date}"), status));
                }
            }
            tokio::time::sleep(self.cooldown).await;
        }
    }

    /// Extract the receiver name from an almanax page.
    ///
    /// Each paragraph is matched on its whole text, inline markup included.
    pub fn extract_receiver(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let mut paragraphs: Vec<_> = document.select(&self.scope).collect();
        if paragraphs.is_empty() {
            paragraphs = document.select(&self.fallback).collect();
        }

        paragraphs
            .iter()
            .map(|paragraph| paragraph.text().collect::<String>())
            .find_map(|text| {
                self.pattern
                    .captures(&text)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
            .unwrap_or_default()
    }
}
