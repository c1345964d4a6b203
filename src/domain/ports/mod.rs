//! Port trait definitions (Hexagonal Architecture)
//!
//! - PerceptionRunner: the external exploration run driven by the cycle loop
//!
//! Keeping the runner behind a trait lets the learning engine run fully
//! offline against scripted outcomes.

pub mod perception_runner;

pub use perception_runner::{PerceptionOutcome, PerceptionRunner};
