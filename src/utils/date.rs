// src/utils/date.rs

//! Calendar date helpers for `YYYY-MM-DD` strings.

use chrono::NaiveDate;

use crate::error::{AppError, Result};

/// Canonical date format used for almanax days.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Check that a string looks like a `YYYY-MM-DD` date.
///
/// This is a format and range check only: month must be 1-12 and day 1-31.
/// Day-in-month is not cross-checked, so `2024-02-30` is accepted.
pub fn is_date(date: &str) -> bool {
    let bytes = date.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }

    let field = |range: std::ops::Range<usize>| -> Option<u32> {
        let part = &date[range];
        if part.bytes().all(|b| b.is_ascii_digit()) {
            part.parse().ok()
        } else {
            None
        }
    };

    match (field(0..4), field(5..7), field(8..10)) {
        (Some(_), Some(month), Some(day)) => (1..=12).contains(&month) && (1..=31).contains(&day),
        _ => false,
    }
}

/// Parse a `YYYY-MM-DD` string into a real calendar date.
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| AppError::date(format!("'{date}': {e}")))
}

/// Format a calendar date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Build the inclusive, day-by-day sequence of dates from `from` to `to`.
///
/// Bounds are not re-validated with [`is_date`]; they must parse as real
/// calendar dates or the whole call fails. An empty sequence is returned
/// when `from` is after `to`.
pub fn date_range(from: &str, to: &str) -> Result<Vec<String>> {
    let start = parse_date(from)?;
    let end = parse_date(to)?;

    Ok(start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(format_date)
        .collect())
}
