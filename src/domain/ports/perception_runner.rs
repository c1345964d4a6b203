//! Perception runner port - interface for the exploration run itself.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CrossReferenceRecord, SearchRecord, ToolCallRecord};

/// Everything a completed perception run reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionOutcome {
    /// Final profile text written by the run.
    pub profile_text: String,
    /// Quality score of the profile, expected in `[0, 1]`.
    pub profile_score: f64,
    pub cost_usd: f64,
    pub tool_calls: Vec<ToolCallRecord>,
    pub searches: Vec<SearchRecord>,
    pub cross_references: Vec<CrossReferenceRecord>,
}

/// Trait for the external exploration run.
///
/// A runner explores the subject's data (typically via an LLM tool loop),
/// writes a profile, and scores it. The engine treats it as a black box:
/// it only hands over the current strategy context and consumes the
/// recorded outcome.
///
/// Implementations must return an error rather than a partial outcome when a
/// run cannot complete. Timeouts are the runner's own responsibility.
#[async_trait]
pub trait PerceptionRunner: Send + Sync {
    /// Runner name for logging.
    fn name(&self) -> &'static str;

    /// Execute one run to completion.
    ///
    /// `strategy_context` is the rendered latest strategy, or
    /// [`FIRST_RUN_CONTEXT`](crate::domain::models::FIRST_RUN_CONTEXT) when
    /// none exists. `run_number` is 1-based within the current cycle.
    async fn run(&self, strategy_context: &str, run_number: u32) -> DomainResult<PerceptionOutcome>;
}
