//! Infrastructure layer module
//!
//! - Archive persistence (one JSON file per trace and strategy version)
//! - Configuration management
//! - Logging infrastructure

pub mod archive;
pub mod config;
pub mod logging;
