//! Shared library for the content acquisition and playback sync crates.
//!
//! This crate provides common functionality used across all crates:
//! - Configuration management
//! - Normalized content and playback models
//! - Local key/value state on SQLite
//! - Logging infrastructure
//! - Shared error types

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{AcquisitionError, ClientError, ErrorKind};
pub use logging::LogConfig;
pub use models::*;
pub use store::LocalStore;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
