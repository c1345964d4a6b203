//! Domain layer for the exploration engine
//!
//! Trace and strategy models, domain errors, and the runner port.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
