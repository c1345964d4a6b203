use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use footprint_explorer::domain::models::{
    CrossPlatformTopic, CrossReferenceRecord, ProductiveSearch, SearchRecord, SearchTool,
};
use footprint_explorer::{reflect, ExplorationStrategy, ExplorationTrace, StrategyEvolver};
use proptest::prelude::*;

fn search_strategy() -> impl Strategy<Value = SearchRecord> {
    (
        prop::sample::select(vec![
            "alpha", "beta gamma", "a b", "Delta", "rust meetup", "to in", "epsilon",
        ]),
        any::<bool>(),
        0u64..50,
    )
        .prop_map(|(query, was_empty, count)| SearchRecord {
            query: query.to_string(),
            tool: SearchTool::Search,
            was_empty,
            result_count: if was_empty { 0 } else { count },
        })
}

fn xref_strategy() -> impl Strategy<Value = CrossReferenceRecord> {
    (
        "[a-z]{3,8}",
        prop::collection::btree_set(
            prop::sample::select(vec!["github", "reddit", "strava", "spotify"]),
            0..4,
        ),
        0u64..20,
    )
        .prop_map(|(topic, sources, total_matches)| CrossReferenceRecord {
            topic,
            sources_matched: sources.into_iter().map(str::to_string).collect(),
            total_matches,
        })
}

fn trace_strategy() -> impl Strategy<Value = ExplorationTrace> {
    (
        prop::collection::vec(search_strategy(), 0..12),
        prop::collection::vec(xref_strategy(), 0..5),
        0.0f64..=1.0,
        0.0f64..5.0,
    )
        .prop_map(|(searches, cross_references, score, cost)| {
            let mut trace = ExplorationTrace::with_id(run_id_for(&searches), Utc::now(), 0);
            trace.searches = searches;
            trace.cross_references = cross_references;
            trace.profile_score = score;
            trace.cost_usd = cost;
            trace
        })
}

fn run_id_for(searches: &[SearchRecord]) -> String {
    format!("run-{}", searches.len())
}

const OUTPUT: &str = "Alpha enthusiast who attends a Rust meetup. Beta tester.";

proptest! {
    /// Property: useful and wasted partition the distinct queries
    #[test]
    fn prop_reflection_partitions_queries(trace in trace_strategy()) {
        let reflected = reflect(trace.clone(), OUTPUT);

        let useful: HashSet<&String> = reflected.useful_searches.iter().collect();
        let wasted: HashSet<&String> = reflected.wasted_searches.iter().collect();
        prop_assert!(useful.is_disjoint(&wasted));
        prop_assert_eq!(useful.len(), reflected.useful_searches.len());
        prop_assert_eq!(wasted.len(), reflected.wasted_searches.len());

        let all: HashSet<&String> = trace.searches.iter().map(|s| &s.query).collect();
        let labelled: HashSet<&String> = useful.union(&wasted).copied().collect();
        prop_assert_eq!(all, labelled);
    }

    /// Property: an empty search is always wasted
    #[test]
    fn prop_empty_searches_are_wasted(trace in trace_strategy()) {
        let reflected = reflect(trace.clone(), OUTPUT);
        for search in trace.searches.iter().filter(|s| s.was_empty) {
            prop_assert!(reflected.wasted_searches.contains(&search.query));
        }
    }

    /// Property: connections always span at least two sources
    #[test]
    fn prop_connections_are_multi_source(trace in trace_strategy()) {
        let reflected = reflect(trace, OUTPUT);
        prop_assert!(reflected.discovered_connections.iter().all(|c| c.sources.len() >= 2));
    }

    /// Property: evolved strategies respect hit-rate and dead-end thresholds
    #[test]
    fn prop_evolved_entries_meet_thresholds(
        traces in prop::collection::vec(trace_strategy(), 1..8)
    ) {
        let reflected: Vec<ExplorationTrace> =
            traces.into_iter().map(|t| reflect(t, OUTPUT)).collect();
        let strategy = StrategyEvolver::default().evolve_traces(&reflected, 1);

        prop_assert!(strategy.productive_searches.iter().all(|s| s.hit_rate > 0.5));
        prop_assert!(strategy.productive_searches.len() <= 20);
        prop_assert!(strategy.cross_platform_topics.len() <= 10);
        for dead_end in &strategy.dead_end_searches {
            let empty_in = reflected
                .iter()
                .filter(|t| t.searches.iter().any(|s| s.was_empty && &s.query == dead_end))
                .count();
            prop_assert!(empty_in >= 2);
        }
    }

    /// Property: traces survive a JSON round trip unchanged
    #[test]
    fn prop_trace_json_round_trip(trace in trace_strategy()) {
        let reflected = reflect(trace, OUTPUT);
        let json = serde_json::to_string(&reflected).unwrap();
        let back: ExplorationTrace = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, reflected);
    }

    /// Property: strategies survive a JSON round trip unchanged
    #[test]
    fn prop_strategy_json_round_trip(
        version in 1u32..100,
        hit_rate in 0.5f64..=1.0,
        relevance in 0.0f64..=1.0,
        priority in 0.0f64..=1.0,
        cost in 0.0f64..100.0
    ) {
        let mut strategy = ExplorationStrategy::empty(version);
        strategy.productive_searches.push(ProductiveSearch {
            query: "alpha".to_string(),
            hit_rate,
            relevance_score: relevance,
        });
        strategy.dead_end_searches.push("beta".to_string());
        strategy.source_priorities = BTreeMap::from([("github".to_string(), priority)]);
        strategy.cross_platform_topics.push(CrossPlatformTopic {
            topic: "rust".to_string(),
            sources: vec!["github".to_string(), "reddit".to_string()],
            strength: relevance,
        });
        strategy.total_cost_usd = cost;

        let json = serde_json::to_string(&strategy).unwrap();
        let back: ExplorationStrategy = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, strategy);
    }
}
