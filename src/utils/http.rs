// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;

/// User agent sent to the release platform and internal APIs.
pub const DEFAULT_USER_AGENT: &str = concat!("almanax-mapper/", env!("CARGO_PKG_VERSION"));

/// Create a configured asynchronous HTTP client.
pub fn create_client(user_agent: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Join a base URL and a path segment with exactly one slash.
pub fn join_url(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}
