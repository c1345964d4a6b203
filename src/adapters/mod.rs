//! Adapters implementing domain ports.

pub mod runners;
