//! # phishpair Common Library
//!
//! Shared code for the phishpair survey service and labeling tool:
//! - Error type shared by database and configuration helpers
//! - Bootstrap configuration (TOML) and root folder resolution
//! - SQLite initialization, schema synchronization and migrations
//! - Time and UUID helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
