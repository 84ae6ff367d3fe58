// src/error.rs

//! Unified error handling for the almanax mapper.

use std::fmt;

use thiserror::Error;

/// Result type alias for mapper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Every variant is fatal for the current run: errors propagate up to the
/// binary entry point, which logs them and exits non-zero.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Relative duration could not be parsed
    #[error("Invalid duration '{input}': {message}")]
    Duration { input: String, message: String },

    /// Calendar date could not be parsed
    #[error("Invalid date: {0}")]
    Date(String),

    /// A remote answered with a status the caller cannot handle
    #[error("Unexpected status {status} from {context}")]
    UnexpectedStatus { context: String, status: u16 },

    /// A resolved receiver has no record in the dataset
    #[error("Could not find offering receiver '{receiver}' for {date}")]
    UnmatchedReceiver { date: String, receiver: String },

    /// The dataset contains the same receiver twice
    #[error("Duplicate offering receiver in dataset: {0}")]
    DuplicateReceiver(String),

    /// Release lookup or asset operation failed
    #[error("Release error: {0}")]
    Release(String),

    /// A background task stopped unexpectedly
    #[error("Task error: {0}")]
    Task(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a duration parsing error.
    pub fn duration(input: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Duration {
            input: input.into(),
            message: message.to_string(),
        }
    }

    /// Create a date parsing error.
    pub fn date(message: impl Into<String>) -> Self {
        Self::Date(message.into())
    }

    /// Create an unexpected-status error with context.
    pub fn status(context: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus {
            context: context.into(),
            status,
        }
    }

    /// Create a release error.
    pub fn release(message: impl Into<String>) -> Self {
        Self::Release(message.into())
    }

    /// Create a task error.
    pub fn task(message: impl fmt::Display) -> Self {
        Self::Task(message.to_string())
    }
}
