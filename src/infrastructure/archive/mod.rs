//! Append-only trace and strategy archive
//!
//! - One JSON file per trace and per strategy version
//! - Corrupt files skipped on load
//! - Recency-and-score ranked sampling

pub mod sampling;
pub mod store;

pub use sampling::{rank_traces, softmax, trace_score};
pub use store::Archive;
