// src/models/mod.rs

//! Domain models for the almanax mapper.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod almanax;
mod api;
mod config;
mod release;

// Re-export all public types
pub use almanax::{AlmanaxRecord, ImageUrls, Localized, Offering, ensure_unique_receivers};
pub use api::AlmanaxApiEntry;
pub use config::{ApiConfig, Config, NotifyConfig, ReleaseConfig, ResolverConfig, WatcherConfig};
pub use release::{MetaVersion, Release, ReleaseAsset};
