//! Deterministic reflection over a single trace.
//!
//! Labels every search as useful or wasted by checking whether its terms
//! surfaced in the run's final profile, and lifts multi-source
//! cross-references into discovered connections. No model calls, no I/O.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::models::{DiscoveredConnection, ExplorationTrace};

/// Tokens shorter than this never count as a match ("to", "in", ...).
pub const MIN_MATCH_TOKEN_LEN: usize = 3;

/// Minimum distinct sources for a cross-reference to count as a connection.
pub const MIN_CONNECTION_SOURCES: usize = 2;

/// Populate the trace's derived fields from the final output text.
///
/// A query is wasted whenever any of its occurrences came back empty, or
/// when none of its tokens of at least [`MIN_MATCH_TOKEN_LEN`] characters
/// appear in the output. Each distinct query lands in exactly one list, in
/// first-occurrence order.
pub fn reflect(mut trace: ExplorationTrace, final_output: &str) -> ExplorationTrace {
    let output = final_output.to_lowercase();

    let mut order: Vec<&str> = Vec::new();
    let mut verdicts: HashMap<&str, bool> = HashMap::new();

    for search in &trace.searches {
        let useful = !search.was_empty && mentions_any_token(&search.query, &output);
        match verdicts.get_mut(search.query.as_str()) {
            Some(verdict) => *verdict = *verdict && useful,
            None => {
                order.push(&search.query);
                verdicts.insert(&search.query, useful);
            }
        }
    }

    let mut useful = Vec::new();
    let mut wasted = Vec::new();
    for query in order {
        if verdicts.get(query).copied().unwrap_or(false) {
            useful.push(query.to_string());
        } else {
            wasted.push(query.to_string());
        }
    }

    let connections: Vec<DiscoveredConnection> = trace
        .cross_references
        .iter()
        .filter(|xref| xref.sources_matched.len() >= MIN_CONNECTION_SOURCES)
        .map(|xref| DiscoveredConnection {
            topic: xref.topic.clone(),
            sources: xref.sources_matched.clone(),
            matches: xref.total_matches,
        })
        .collect();

    debug!(
        run_id = %trace.run_id,
        useful = useful.len(),
        wasted = wasted.len(),
        connections = connections.len(),
        "reflected on trace"
    );

    trace.useful_searches = useful;
    trace.wasted_searches = wasted;
    trace.discovered_connections = connections;
    trace
}

/// Whether any sufficiently long token of `query` occurs in `output`.
///
/// `output` must already be lowercased.
fn mentions_any_token(query: &str, output: &str) -> bool {
    query
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_MATCH_TOKEN_LEN)
        .map(str::to_lowercase)
        .any(|token| output.contains(&token))
}
