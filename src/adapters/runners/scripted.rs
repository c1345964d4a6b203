//! Scripted perception runner for offline cycles and tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{PerceptionOutcome, PerceptionRunner};

/// One scripted step.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Return this outcome.
    Complete(PerceptionOutcome),
    /// Fail the run with this message.
    Fail(String),
}

/// A call the runner received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub run_number: u32,
    pub strategy_context: String,
}

/// Replays queued steps, falling back to a default outcome once the queue is
/// drained. With no default, a drained queue fails the run.
pub struct ScriptedRunner {
    steps: Mutex<VecDeque<ScriptedStep>>,
    fallback: Option<PerceptionOutcome>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    pub fn new(steps: impl IntoIterator<Item = ScriptedStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return the same outcome for every run.
    pub fn repeating(outcome: PerceptionOutcome) -> Self {
        Self::new(Vec::new()).with_fallback(outcome)
    }

    pub fn with_fallback(mut self, outcome: PerceptionOutcome) -> Self {
        self.fallback = Some(outcome);
        self
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl PerceptionRunner for ScriptedRunner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, strategy_context: &str, run_number: u32) -> DomainResult<PerceptionOutcome> {
        self.calls.lock().await.push(RecordedCall {
            run_number,
            strategy_context: strategy_context.to_string(),
        });

        let step = self.steps.lock().await.pop_front();
        match step {
            Some(ScriptedStep::Complete(outcome)) => Ok(outcome),
            Some(ScriptedStep::Fail(message)) => Err(DomainError::PerceptionFailed(message)),
            None => self.fallback.clone().ok_or_else(|| {
                DomainError::PerceptionFailed(format!("no scripted outcome for run {run_number}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(cost: f64) -> PerceptionOutcome {
        PerceptionOutcome {
            profile_text: String::new(),
            profile_score: 0.5,
            cost_usd: cost,
            tool_calls: Vec::new(),
            searches: Vec::new(),
            cross_references: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_steps_replay_in_order_then_fallback() {
        let runner = ScriptedRunner::new(vec![
            ScriptedStep::Complete(outcome(0.1)),
            ScriptedStep::Fail("rate limited".to_string()),
        ])
        .with_fallback(outcome(0.9));

        assert!((runner.run("ctx", 1).await.unwrap().cost_usd - 0.1).abs() < f64::EPSILON);
        assert!(matches!(
            runner.run("ctx", 2).await,
            Err(DomainError::PerceptionFailed(msg)) if msg == "rate limited"
        ));
        assert!((runner.run("ctx", 3).await.unwrap().cost_usd - 0.9).abs() < f64::EPSILON);
        assert_eq!(runner.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_drained_script_without_fallback_fails() {
        let runner = ScriptedRunner::new(Vec::new());
        assert!(runner.run("ctx", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_records_contexts() {
        let runner = ScriptedRunner::repeating(outcome(0.0));
        runner.run("first", 1).await.unwrap();
        runner.run("second", 2).await.unwrap();

        let calls = runner.calls().await;
        assert_eq!(calls[1].strategy_context, "second");
        assert_eq!(calls[1].run_number, 2);
    }
}
