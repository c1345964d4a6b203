//! Recency-and-score weighted ranking of archived traces.
//!
//! Each trace gets `sigmoid(score - 0.5) - penalty * ln(1 + age_days)`; a
//! softmax over those values gives a probability per trace, and the top `k`
//! by probability are returned. This is a deterministic ranking: the same
//! archive and clock always produce the same selection in the same order.

use chrono::{DateTime, Utc};

use crate::domain::models::ExplorationTrace;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Age in days; unparsable or future timestamps count as age 0.
fn age_days(trace: &ExplorationTrace, now: DateTime<Utc>) -> f64 {
    trace
        .parsed_timestamp()
        .map(|ts| (now - ts).num_milliseconds() as f64 / MILLIS_PER_DAY)
        .filter(|days| days.is_finite() && *days > 0.0)
        .unwrap_or(0.0)
}

/// Raw ranking score for one trace.
pub fn trace_score(trace: &ExplorationTrace, now: DateTime<Utc>, recency_penalty: f64) -> f64 {
    let normalized = sigmoid(trace.profile_score - 0.5);
    let penalty = recency_penalty * age_days(trace, now).ln_1p();
    normalized - penalty
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Select the `k` highest-probability traces.
///
/// When there are at most `k` traces all of them are returned in archive
/// order. Ties keep archive order.
pub fn rank_traces(
    traces: &[ExplorationTrace],
    k: usize,
    now: DateTime<Utc>,
    recency_penalty: f64,
) -> Vec<&ExplorationTrace> {
    if traces.len() <= k {
        return traces.iter().collect();
    }

    let scores: Vec<f64> = traces
        .iter()
        .map(|trace| trace_score(trace, now, recency_penalty))
        .collect();
    let probabilities = softmax(&scores);

    let mut ranked: Vec<(f64, &ExplorationTrace)> =
        probabilities.into_iter().zip(traces.iter()).collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.into_iter().take(k).map(|(_, trace)| trace).collect()
}
