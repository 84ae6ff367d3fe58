//! Service layer for the almanax mapper.
//!
//! This module contains the business logic for:
//! - Receiver lookup (`ReceiverResolver`)
//! - Version change detection (`VersionWatcher`)
//! - Date to record mapping (`MappingReconciler`)
//! - Dataset publishing (`ReleasePublisher`)
//! - Localized metadata pushing (`AlmanaxPusher`)

pub mod publish;
pub mod push;
pub mod receiver;
pub mod reconcile;
pub mod watcher;

pub use publish::{Notifier, PublisherConfig, ReleasePublisher, UpdateHook, fetch_dataset};
pub use push::{AlmanaxApi, AlmanaxPusher, HttpAlmanaxApi, PushOutcome, WriteMode};
pub use receiver::{AlmanaxPages, PageFetch, PageSource, ReceiverResolver};
pub use reconcile::{MappingReconciler, Reconciliation};
pub use watcher::{MetaEndpoint, VersionSource, VersionWatcher, WatchState};
