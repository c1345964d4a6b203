pub mod cycle_controller;
pub mod reflection;
pub mod strategy_evolver;

pub use cycle_controller::{
    CycleAborted, CycleController, CycleReport, CycleState, RunResult, StopReason,
};
pub use reflection::reflect;
pub use strategy_evolver::StrategyEvolver;
