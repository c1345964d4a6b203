//! Budget-bounded loop of perception runs with periodic strategy evolution.
//!
//! Runs are strictly sequential: each run is handed the latest strategy,
//! its trace is reflected on and archived immediately, and every
//! `evolve_every_n` archived runs a new strategy version is evolved. The
//! budget is a soft limit checked between runs; a run is never interrupted.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CycleConfig, ExplorationStrategy, ExplorationTrace, FIRST_RUN_CONTEXT};
use crate::domain::ports::{PerceptionOutcome, PerceptionRunner};
use crate::infrastructure::archive::Archive;
use crate::services::reflection::reflect;
use crate::services::strategy_evolver::StrategyEvolver;

/// Why a cycle stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Cumulative cost reached the budget.
    BudgetExhausted,
    /// All allotted runs completed.
    RunLimitReached,
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// No cycle has started yet.
    Idle,
    /// Executing the given 1-based run of the current cycle.
    Running {
        /// Run being executed.
        run_number: u32,
    },
    /// Last cycle finished normally.
    Stopped(StopReason),
    /// Last cycle ended with an error.
    Aborted,
}

/// Outcome of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// 1-based position within the cycle.
    pub run_number: u32,
    /// Run id of the archived trace.
    pub run_id: String,
    /// Strategy version handed to the runner (0 = first-run context).
    pub strategy_version: u32,
    /// Score after clamping to [0, 1].
    pub profile_score: f64,
    /// Cost of this run alone.
    pub cost_usd: f64,
    /// Cost of this run and every earlier run in the cycle.
    pub cumulative_cost_usd: f64,
    /// Wall-clock time spent in the runner.
    pub duration_seconds: f64,
    /// Version evolved right after this run, if evolution triggered.
    pub evolved_version: Option<u32>,
}

/// Summary of a cycle that ran to a normal stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Completed runs in order.
    pub results: Vec<RunResult>,
    /// Why the cycle stopped.
    pub stop_reason: StopReason,
    /// Latest loaded strategy version after the cycle.
    pub final_strategy_version: Option<u32>,
}

impl CycleReport {
    /// Number of runs that completed.
    pub fn completed_runs(&self) -> usize {
        self.results.len()
    }

    /// Total cost spent by the cycle.
    pub fn total_cost_usd(&self) -> f64 {
        self.results.last().map_or(0.0, |result| result.cumulative_cost_usd)
    }
}

/// A cycle cut short by a runner, archive or evolution failure.
///
/// `completed` holds exactly the runs of this cycle that were archived.
#[derive(Debug, Error)]
#[error("cycle aborted after {} completed runs: {source}", .completed.len())]
pub struct CycleAborted {
    /// Runs archived before the failure, including one whose evolution failed.
    pub completed: Vec<RunResult>,
    /// Latest loaded strategy version at the time of the failure.
    pub final_strategy_version: Option<u32>,
    /// Underlying failure.
    #[source]
    pub source: DomainError,
}

/// Drives perception runs for one subject.
pub struct CycleController {
    runner: Arc<dyn PerceptionRunner>,
    archive: Archive,
    evolver: StrategyEvolver,
    state: CycleState,
}

impl CycleController {
    /// Controller over `archive`, starting idle.
    pub fn new(runner: Arc<dyn PerceptionRunner>, archive: Archive, evolver: StrategyEvolver) -> Self {
        Self {
            runner,
            archive,
            evolver,
            state: CycleState::Idle,
        }
    }

    /// Archive being driven.
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Give back the archive.
    pub fn into_archive(self) -> Archive {
        self.archive
    }

    /// Current controller state.
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run up to `config.max_runs` runs or until the budget is spent.
    #[instrument(skip(self, config), fields(subject = %self.archive.subject(), runner = self.runner.name()))]
    pub async fn run_cycle(&mut self, config: &CycleConfig) -> Result<CycleReport, CycleAborted> {
        if config.evolve_every_n == 0 {
            return Err(self.abort(
                Vec::new(),
                DomainError::ValidationFailed("evolve_every_n must be at least 1".to_string()),
            ));
        }

        let mut results: Vec<RunResult> = Vec::new();
        let mut cumulative_cost = 0.0;
        let mut stop_reason = StopReason::RunLimitReached;

        for run_number in 1..=config.max_runs {
            self.state = CycleState::Running { run_number };

            let mut result = match self.execute_run(run_number).await {
                Ok(result) => result,
                Err(err) => return Err(self.abort(results, err)),
            };

            cumulative_cost += result.cost_usd;
            result.cumulative_cost_usd = cumulative_cost;
            results.push(result);

            // Archived runs stay reported even when evolution fails.
            match self.evolve_if_due(config.evolve_every_n).await {
                Ok(Some(version)) => {
                    if let Some(last) = results.last_mut() {
                        last.evolved_version = Some(version);
                    }
                }
                Ok(None) => {}
                Err(err) => return Err(self.abort(results, err)),
            }

            if cumulative_cost >= config.max_budget_usd {
                info!(
                    run_number,
                    cumulative_cost_usd = cumulative_cost,
                    max_budget_usd = config.max_budget_usd,
                    "budget exhausted, stopping cycle"
                );
                stop_reason = StopReason::BudgetExhausted;
                break;
            }
        }

        self.state = CycleState::Stopped(stop_reason);
        let final_strategy_version = self.archive.latest_strategy().map(|s| s.version);
        info!(
            completed_runs = results.len(),
            ?stop_reason,
            ?final_strategy_version,
            "cycle finished"
        );

        Ok(CycleReport {
            results,
            stop_reason,
            final_strategy_version,
        })
    }

    /// Perform one run and archive its reflected trace.
    async fn execute_run(&mut self, run_number: u32) -> DomainResult<RunResult> {
        let latest = self.archive.latest_strategy();
        let strategy_version = latest.map_or(0, |strategy| strategy.version);
        let context = latest.map_or_else(|| FIRST_RUN_CONTEXT.to_string(), ExplorationStrategy::render_context);

        let started = Instant::now();
        let outcome = self.runner.run(&context, run_number).await?;
        let duration_seconds = started.elapsed().as_secs_f64();

        let (trace, profile_text) = build_trace(outcome, strategy_version, duration_seconds)?;
        let trace = reflect(trace, &profile_text);

        let result = RunResult {
            run_number,
            run_id: trace.run_id.clone(),
            strategy_version,
            profile_score: trace.profile_score,
            cost_usd: trace.cost_usd,
            cumulative_cost_usd: 0.0,
            duration_seconds,
            evolved_version: None,
        };
        self.archive.add_trace(trace).await?;

        info!(
            run_number,
            run_id = %result.run_id,
            profile_score = result.profile_score,
            cost_usd = result.cost_usd,
            strategy_version,
            "run archived"
        );

        Ok(result)
    }

    /// Evolve and save a new strategy when the archive's run count hits the interval.
    async fn evolve_if_due(&mut self, evolve_every_n: u32) -> DomainResult<Option<u32>> {
        if self.archive.run_count() % u64::from(evolve_every_n) != 0 {
            return Ok(None);
        }

        let strategy = self.evolver.evolve(&self.archive);
        let version = strategy.version;
        self.archive.save_strategy(strategy).await?;
        Ok(Some(version))
    }

    fn abort(&mut self, completed: Vec<RunResult>, source: DomainError) -> CycleAborted {
        warn!(completed_runs = completed.len(), error = %source, "cycle aborted");
        self.state = CycleState::Aborted;
        CycleAborted {
            completed,
            final_strategy_version: self.archive.latest_strategy().map(|s| s.version),
            source,
        }
    }
}

/// Validate a runner outcome and turn it into an unreflected trace.
///
/// Returns the trace together with the profile text to reflect against.
fn build_trace(
    outcome: PerceptionOutcome,
    strategy_version: u32,
    duration_seconds: f64,
) -> DomainResult<(ExplorationTrace, String)> {
    if !outcome.cost_usd.is_finite() || outcome.cost_usd < 0.0 {
        return Err(DomainError::InvalidOutcome(format!(
            "cost must be a non-negative number, got {}",
            outcome.cost_usd
        )));
    }
    if !outcome.profile_score.is_finite() {
        return Err(DomainError::InvalidOutcome(format!(
            "profile score must be finite, got {}",
            outcome.profile_score
        )));
    }

    let profile_score = outcome.profile_score.clamp(0.0, 1.0);
    if profile_score != outcome.profile_score {
        warn!(
            reported = outcome.profile_score,
            clamped = profile_score,
            "profile score outside [0, 1], clamping"
        );
    }

    let mut trace = ExplorationTrace::new(strategy_version);
    trace.tool_calls = outcome.tool_calls;
    trace.searches = outcome.searches;
    trace.cross_references = outcome.cross_references;
    trace.profile_score = profile_score;
    trace.cost_usd = outcome.cost_usd;
    trace.duration_seconds = duration_seconds;

    Ok((trace, outcome.profile_text))
}
