//! Footprint Explorer - adaptive exploration engine
//!
//! Turns a sequence of perception runs over a subject's digital footprint
//! into a persistent, versioned strategy that steers later runs toward
//! productive searches and away from dead ends.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): trace and strategy models, errors, the
//!   `PerceptionRunner` port
//! - **Service Layer** (`services`): reflection, strategy evolution, the
//!   budget-bounded cycle controller
//! - **Infrastructure Layer** (`infrastructure`): the file-backed archive,
//!   configuration, logging
//! - **Adapters** (`adapters`): runner implementations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use footprint_explorer::adapters::runners::ScriptedRunner;
//! use footprint_explorer::domain::ports::PerceptionOutcome;
//! use footprint_explorer::{Archive, ConfigLoader, CycleController, StrategyEvolver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let archive = Archive::open_with(&config.archive.root, "alice", config.sampling).await?;
//!     let runner = Arc::new(ScriptedRunner::repeating(PerceptionOutcome {
//!         profile_text: "Alice climbs and writes Rust.".to_string(),
//!         profile_score: 0.7,
//!         cost_usd: 0.2,
//!         tool_calls: vec![],
//!         searches: vec![],
//!         cross_references: vec![],
//!     }));
//!
//!     let mut controller =
//!         CycleController::new(runner, archive, StrategyEvolver::new(config.evolver.clone()));
//!     let report = controller.run_cycle(&config.cycle).await?;
//!     println!("{} runs, stopped: {:?}", report.completed_runs(), report.stop_reason);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, CycleConfig, EvolverConfig, ExplorationStrategy, ExplorationTrace, LoggingConfig,
    SamplingConfig,
};
pub use domain::ports::{PerceptionOutcome, PerceptionRunner};
pub use infrastructure::archive::Archive;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::LoggerImpl;
pub use services::{
    reflect, CycleAborted, CycleController, CycleReport, RunResult, StopReason, StrategyEvolver,
};
