// src/utils/duration.rs

//! Human-friendly relative durations such as `"1y"`, `"1.5w"` or `"-2Y3M"`.
//!
//! Calendar units use fixed lengths (30-day month, 365-day year); no
//! calendar-aware arithmetic is performed. Clock units (`h`, `m`, `s`, `ms`)
//! are accepted as well so the poll interval shares the same grammar.

use chrono::Duration;

use crate::error::{AppError, Result};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Unit suffixes and their length in hours, in match precedence order.
///
/// Longer suffixes come first so `ms` is never read as `m` followed by `s`.
/// `M` is a 30-day month, `m` is a minute.
const UNITS: &[(&str, f64)] = &[
    ("ms", 1.0 / 3_600_000.0),
    ("y", 8760.0),
    ("Y", 8760.0),
    ("M", 720.0),
    ("w", 168.0),
    ("W", 168.0),
    ("d", 24.0),
    ("D", 24.0),
    ("h", 1.0),
    ("m", 1.0 / 60.0),
    ("s", 1.0 / 3600.0),
];

/// Parse a composite relative duration into a signed [`Duration`].
///
/// The input is one or more `<number><unit>` tokens, optionally prefixed
/// by a single `-` that negates the whole expression. The result is the sum
/// of `value * unit_hours` over all tokens, rounded to milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    if body.is_empty() {
        return Err(AppError::duration(input, "empty duration"));
    }

    let mut hours = 0.0_f64;
    let mut rest = body;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);

        if number.is_empty() {
            return Err(AppError::duration(input, format!("expected a number at '{rest}'")));
        }

        let (suffix, unit_hours) = UNITS
            .iter()
            .find(|(suffix, _)| tail.starts_with(suffix))
            .copied()
            .ok_or_else(|| {
                if tail.is_empty() {
                    AppError::duration(input, format!("missing unit after '{number}'"))
                } else {
                    AppError::duration(input, format!("unknown unit at '{tail}'"))
                }
            })?;

        let value: f64 = number
            .parse()
            .map_err(|e| AppError::duration(input, format!("'{number}': {e}")))?;

        hours += value * unit_hours;
        rest = &tail[suffix.len()..];
    }

    let millis = (hours * MS_PER_HOUR).round() as i64;
    let millis = if negative { -millis } else { millis };
    Ok(Duration::milliseconds(millis))
}

/// Parse a duration that must be strictly positive, as a std duration.
///
/// Used for tick intervals where a zero or negative value makes no sense.
pub fn parse_interval(input: &str) -> Result<std::time::Duration> {
    let duration = parse_duration(input)?;
    if duration <= Duration::zero() {
        return Err(AppError::duration(input, "interval must be positive"));
    }
    duration
        .to_std()
        .map_err(|e| AppError::duration(input, e))
}
