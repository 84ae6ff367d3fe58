//! Utility functions and helpers.

pub mod date;
pub mod duration;
pub mod http;

pub use date::{date_range, format_date, is_date, parse_date};
pub use duration::{parse_duration, parse_interval};

use std::time::Duration;

use rand::Rng;

/// Sleep for a random duration between `min` and `max` (inclusive).
///
/// Used between calls to the almanax page source to stay polite.
pub async fn jitter_sleep(min: Duration, max: Duration) {
    let delay = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    log::debug!("Sleeping {:?} before the next lookup", delay);
    tokio::time::sleep(delay).await;
}
