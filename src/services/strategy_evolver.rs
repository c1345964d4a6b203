//! Strategy evolution over the full trace history.
//!
//! Every call re-aggregates all archived traces from scratch:
//! 1. Productive searches: per-query hit rate and score-weighted relevance
//! 2. Dead ends: queries that came back empty in several traces
//! 3. Source priorities: mean profile score of traces exploring each source
//! 4. Cross-platform topics: merged multi-source connections, normalized
//! 5. Recommended tool sequence: that of the best-scoring trace
//!
//! The archive is only read; persisting the result is the caller's job.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::info;

use crate::domain::models::{
    CrossPlatformTopic, EvolverConfig, ExplorationStrategy, ExplorationTrace, ProductiveSearch,
};
use crate::infrastructure::archive::Archive;

#[derive(Debug, Default)]
struct QueryTally {
    hits: u32,
    misses: u32,
    weight: f64,
}

#[derive(Debug, Default)]
struct TopicTally {
    sources: BTreeSet<String>,
    matches: u64,
}

/// Compresses archived traces into the next strategy version.
#[derive(Debug, Clone, Default)]
pub struct StrategyEvolver {
    config: EvolverConfig,
}

impl StrategyEvolver {
    pub fn new(config: EvolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvolverConfig {
        &self.config
    }

    /// Build the next strategy from everything in `archive`.
    pub fn evolve(&self, archive: &Archive) -> ExplorationStrategy {
        let version = archive.latest_version() + 1;
        let strategy = self.evolve_traces(archive.traces(), version);

        info!(
            subject = archive.subject(),
            version = strategy.version,
            derived_from_runs = strategy.derived_from_runs,
            productive = strategy.productive_searches.len(),
            dead_ends = strategy.dead_end_searches.len(),
            topics = strategy.cross_platform_topics.len(),
            "evolved strategy"
        );
        strategy
    }

    /// Aggregate `traces` into a strategy carrying `version`.
    pub fn evolve_traces(&self, traces: &[ExplorationTrace], version: u32) -> ExplorationStrategy {
        let mut strategy = ExplorationStrategy::empty(version);
        if traces.is_empty() {
            return strategy;
        }

        strategy.productive_searches = self.productive_searches(traces);
        strategy.dead_end_searches = self.dead_end_searches(traces);
        strategy.source_priorities = source_priorities(traces);
        strategy.cross_platform_topics = self.cross_platform_topics(traces);
        strategy.recommended_tool_sequence = recommended_tool_sequence(traces);
        strategy.derived_from_runs = traces.len() as u64;
        strategy.total_cost_usd = traces.iter().map(|trace| trace.cost_usd).sum();
        strategy
    }

    fn productive_searches(&self, traces: &[ExplorationTrace]) -> Vec<ProductiveSearch> {
        let mut tallies: BTreeMap<&str, QueryTally> = BTreeMap::new();
        for trace in traces {
            let weight = trace.profile_score.max(self.config.relevance_weight_floor);
            for query in &trace.useful_searches {
                let tally = tallies.entry(query.as_str()).or_default();
                tally.hits += 1;
                tally.weight += weight;
            }
            for query in &trace.wasted_searches {
                tallies.entry(query.as_str()).or_default().misses += 1;
            }
        }

        let trace_count = traces.len() as f64;
        let mut productive: Vec<ProductiveSearch> = tallies
            .into_iter()
            .filter_map(|(query, tally)| {
                let total = tally.hits + tally.misses;
                if total == 0 {
                    return None;
                }
                let hit_rate = f64::from(tally.hits) / f64::from(total);
                (hit_rate > self.config.min_hit_rate).then(|| ProductiveSearch {
                    query: query.to_string(),
                    hit_rate,
                    relevance_score: (tally.weight / trace_count).min(1.0),
                })
            })
            .collect();

        // BTreeMap order plus a stable sort breaks ties alphabetically.
        productive.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        productive.truncate(self.config.max_productive_searches);
        productive
    }

    fn dead_end_searches(&self, traces: &[ExplorationTrace]) -> Vec<String> {
        let mut empty_in: BTreeMap<&str, usize> = BTreeMap::new();
        for trace in traces {
            let empties: HashSet<&str> = trace
                .searches
                .iter()
                .filter(|search| search.was_empty)
                .map(|search| search.query.as_str())
                .collect();
            for query in empties {
                *empty_in.entry(query).or_default() += 1;
            }
        }

        let mut dead_ends: Vec<(&str, usize)> = empty_in
            .into_iter()
            .filter(|(_, count)| *count >= self.config.dead_end_min_traces)
            .collect();
        dead_ends.sort_by(|a, b| b.1.cmp(&a.1));
        dead_ends
            .into_iter()
            .take(self.config.max_dead_ends)
            .map(|(query, _)| query.to_string())
            .collect()
    }

    fn cross_platform_topics(&self, traces: &[ExplorationTrace]) -> Vec<CrossPlatformTopic> {
        let mut tallies: BTreeMap<&str, TopicTally> = BTreeMap::new();
        for connection in traces.iter().flat_map(|trace| &trace.discovered_connections) {
            let tally = tallies.entry(connection.topic.as_str()).or_default();
            tally.sources.extend(connection.sources.iter().cloned());
            tally.matches += connection.matches;
        }

        let kept: Vec<(&str, TopicTally)> = tallies
            .into_iter()
            .filter(|(_, tally)| tally.sources.len() >= 2)
            .collect();
        let max_matches = kept.iter().map(|(_, tally)| tally.matches).max().unwrap_or(0);

        let mut topics: Vec<CrossPlatformTopic> = kept
            .into_iter()
            .map(|(topic, tally)| CrossPlatformTopic {
                topic: topic.to_string(),
                sources: tally.sources.into_iter().collect(),
                strength: if max_matches == 0 {
                    0.0
                } else {
                    tally.matches as f64 / max_matches as f64
                },
            })
            .collect();
        topics.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        topics.truncate(self.config.max_cross_platform_topics);
        topics
    }
}

/// Mean profile score of the traces that explored each source.
fn source_priorities(traces: &[ExplorationTrace]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for trace in traces {
        for source in trace.explored_sources() {
            let entry = totals.entry(source).or_insert((0.0, 0));
            entry.0 += trace.profile_score;
            entry.1 += 1;
        }
    }
    totals
        .into_iter()
        .map(|(source, (sum, count))| (source, sum / f64::from(count)))
        .collect()
}

/// Tool sequence of the highest-scoring trace; the first one wins ties.
fn recommended_tool_sequence(traces: &[ExplorationTrace]) -> Vec<String> {
    let mut best: Option<&ExplorationTrace> = None;
    for trace in traces {
        if best.map_or(true, |current| trace.profile_score > current.profile_score) {
            best = Some(trace);
        }
    }
    best.map(ExplorationTrace::tool_sequence).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        CrossReferenceRecord, DiscoveredConnection, SearchRecord, SearchTool, ToolCallRecord,
    };
    use serde_json::json;

    fn trace(id: &str, score: f64) -> ExplorationTrace {
        let mut trace = ExplorationTrace::with_id(id, chrono::Utc::now(), 0);
        trace.profile_score = score;
        trace.cost_usd = 0.1;
        trace
    }

    fn empty_search(query: &str) -> SearchRecord {
        SearchRecord {
            query: query.to_string(),
            tool: SearchTool::Search,
            was_empty: true,
            result_count: 0,
        }
    }

    fn connection(topic: &str, sources: &[&str], matches: u64) -> DiscoveredConnection {
        DiscoveredConnection {
            topic: topic.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            matches,
        }
    }

    fn tool(name: &str, source: Option<&str>) -> ToolCallRecord {
        ToolCallRecord {
            name: name.to_string(),
            args: source.map_or_else(|| json!({}), |s| json!({ "source": s })),
            result_size_bytes: 0,
            was_empty: false,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_empty_history_yields_bootstrap_strategy() {
        let strategy = StrategyEvolver::default().evolve_traces(&[], 1);
        assert_eq!(strategy, ExplorationStrategy::empty(1));
    }

    #[test]
    fn test_relevance_is_score_weighted_and_bounded() {
        let mut a = trace("a", 0.6);
        a.useful_searches.push("alpha".to_string());
        let mut b = trace("b", 0.9);
        b.useful_searches.push("alpha".to_string());

        let strategy = StrategyEvolver::default().evolve_traces(&[a, b], 1);
        let alpha = &strategy.productive_searches[0];
        assert_eq!(alpha.query, "alpha");
        assert!((alpha.hit_rate - 1.0).abs() < 1e-12);
        assert!((alpha.relevance_score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_score_run_still_contributes_floor_weight() {
        let mut a = trace("a", 0.0);
        a.useful_searches.push("alpha".to_string());

        let strategy = StrategyEvolver::default().evolve_traces(&[a], 1);
        assert!((strategy.productive_searches[0].relevance_score - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_even_split_is_not_productive() {
        let mut a = trace("a", 0.9);
        a.useful_searches.push("gamma".to_string());
        let mut b = trace("b", 0.9);
        b.wasted_searches.push("gamma".to_string());

        let strategy = StrategyEvolver::default().evolve_traces(&[a, b], 1);
        assert!(strategy.productive_searches.is_empty());
    }

    #[test]
    fn test_productive_searches_capped_and_sorted() {
        let traces: Vec<ExplorationTrace> = (0..25)
            .map(|i| {
                let mut t = trace(&format!("t{i}"), f64::from(i) / 25.0);
                t.useful_searches.push(format!("query-{i:02}"));
                t
            })
            .collect();

        let strategy = StrategyEvolver::default().evolve_traces(&traces, 1);
        assert_eq!(strategy.productive_searches.len(), 20);
        assert_eq!(strategy.productive_searches[0].query, "query-24");
        assert!(strategy
            .productive_searches
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
    }

    #[test]
    fn test_dead_end_requires_two_traces() {
        let mut a = trace("a", 0.5);
        a.searches.push(empty_search("beta"));
        a.searches.push(empty_search("beta"));
        a.searches.push(empty_search("delta"));
        let mut b = trace("b", 0.5);
        b.searches.push(empty_search("beta"));

        let strategy = StrategyEvolver::default().evolve_traces(&[a, b], 1);
        assert_eq!(strategy.dead_end_searches, vec!["beta"]);
    }

    #[test]
    fn test_source_priority_is_mean_score_of_exploring_traces() {
        let mut a = trace("a", 0.2);
        a.tool_calls.push(tool("browse", Some("github")));
        let mut b = trace("b", 0.8);
        b.cross_references.push(CrossReferenceRecord {
            topic: "rust".to_string(),
            sources_matched: ["github", "reddit"].iter().map(|s| s.to_string()).collect(),
            total_matches: 3,
        });

        let strategy = StrategyEvolver::default().evolve_traces(&[a, b], 1);
        assert!((strategy.source_priorities["github"] - 0.5).abs() < 1e-12);
        assert!((strategy.source_priorities["reddit"] - 0.8).abs() < 1e-12);
        assert!(!strategy.source_priorities.contains_key("spotify"));
    }

    #[test]
    fn test_cross_platform_topics_merge_and_normalize() {
        let mut a = trace("a", 0.5);
        a.discovered_connections.push(connection("running", &["strava", "spotify"], 2));
        a.discovered_connections.push(connection("rust", &["github", "reddit"], 8));
        let mut b = trace("b", 0.5);
        b.discovered_connections.push(connection("running", &["strava", "youtube"], 2));

        let strategy = StrategyEvolver::default().evolve_traces(&[a, b], 1);
        let topics = &strategy.cross_platform_topics;
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].topic, "rust");
        assert!((topics[0].strength - 1.0).abs() < 1e-12);
        assert_eq!(topics[1].topic, "running");
        assert!((topics[1].strength - 0.5).abs() < 1e-12);
        assert_eq!(topics[1].sources, vec!["spotify", "strava", "youtube"]);
    }

    #[test]
    fn test_recommended_sequence_first_best_wins() {
        let mut a = trace("a", 0.7);
        a.tool_calls.push(tool("overview", None));
        let mut b = trace("b", 0.9);
        b.tool_calls.push(tool("search", None));
        b.tool_calls.push(tool("browse", Some("github")));
        let mut c = trace("c", 0.9);
        c.tool_calls.push(tool("cross_reference", None));

        let strategy = StrategyEvolver::default().evolve_traces(&[a, b, c], 1);
        assert_eq!(strategy.recommended_tool_sequence, vec!["search", "browse"]);
    }

    #[test]
    fn test_run_count_and_cost_totals() {
        let traces = vec![trace("a", 0.1), trace("b", 0.2), trace("c", 0.3)];
        let strategy = StrategyEvolver::default().evolve_traces(&traces, 4);
        assert_eq!(strategy.version, 4);
        assert_eq!(strategy.derived_from_runs, 3);
        assert!((strategy.total_cost_usd - 0.3).abs() < 1e-12);
    }
}
