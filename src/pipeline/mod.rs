//! Pipeline entry points.
//!
//! - `run_watch`: watch the dataset version and map every new one
//! - `run_map`: map and publish a single version
//! - `run_push`: push a date range to the downstream almanax API

pub mod push;
pub mod watch;

pub use push::{PushRequest, run_push, run_push_with};
pub use watch::{MappingCycle, consume, run_map, run_watch, run_watch_with};
