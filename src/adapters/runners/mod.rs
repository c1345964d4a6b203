//! Perception runner adapter implementations.

pub mod scripted;

pub use scripted::{RecordedCall, ScriptedRunner, ScriptedStep};
