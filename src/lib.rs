// src/lib.rs

//! Almanax mapper library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod shutdown;
pub mod storage;
pub mod utils;
