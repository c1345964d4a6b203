//! Exploration strategy: a versioned distillation of archived traces.
//!
//! Strategies are never mutated once created. A newer version supersedes the
//! previous one and the latest version is whichever has the highest number.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Context handed to the runner when no strategy has been evolved yet.
pub const FIRST_RUN_CONTEXT: &str =
    "First run: no prior strategy exists. Explore broadly across all sources.";

/// A query that has paid off across history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductiveSearch {
    /// Query text as issued.
    pub query: String,
    /// Share of traces containing the query that found it useful.
    pub hit_rate: f64,
    /// Score-weighted usefulness across all traces, at most 1.
    pub relevance_score: f64,
}

/// A topic matched by two or more sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossPlatformTopic {
    /// Topic label.
    pub topic: String,
    /// Sources it was matched in, sorted.
    pub sources: Vec<String>,
    /// Normalized match strength in [0, 1].
    pub strength: f64,
}

/// Learned guidance for the next runs of one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationStrategy {
    /// Version number, starting at 1.
    pub version: u32,
    /// Queries that reliably helped, best first.
    pub productive_searches: Vec<ProductiveSearch>,
    /// Queries that came back empty in several runs.
    pub dead_end_searches: Vec<String>,
    /// Weight per source in [0, 1].
    pub source_priorities: BTreeMap<String, f64>,
    /// Topics linking several sources, strongest first.
    pub cross_platform_topics: Vec<CrossPlatformTopic>,
    /// Tool names that opened the best-scoring run.
    pub recommended_tool_sequence: Vec<String>,
    /// Number of traces this version was built from.
    pub derived_from_runs: u64,
    /// Total cost of those traces.
    pub total_cost_usd: f64,
}

impl ExplorationStrategy {
    /// An empty strategy at the given version.
    pub fn empty(version: u32) -> Self {
        Self {
            version,
            productive_searches: Vec::new(),
            dead_end_searches: Vec::new(),
            source_priorities: BTreeMap::new(),
            cross_platform_topics: Vec::new(),
            recommended_tool_sequence: Vec::new(),
            derived_from_runs: 0,
            total_cost_usd: 0.0,
        }
    }

    /// True when two strategies carry the same learned content, ignoring the
    /// version number.
    pub fn same_content(&self, other: &Self) -> bool {
        self.productive_searches == other.productive_searches
            && self.dead_end_searches == other.dead_end_searches
            && self.source_priorities == other.source_priorities
            && self.cross_platform_topics == other.cross_platform_topics
            && self.recommended_tool_sequence == other.recommended_tool_sequence
            && self.derived_from_runs == other.derived_from_runs
            && self.total_cost_usd == other.total_cost_usd
    }

    /// Human-readable summary fed to the next perception run.
    pub fn render_context(&self) -> String {
        let mut lines = vec![format!(
            "Exploration strategy v{} (learned from {} runs, ${:.2} spent)",
            self.version, self.derived_from_runs, self.total_cost_usd
        )];

        if !self.productive_searches.is_empty() {
            lines.push(String::new());
            lines.push("Productive searches:".to_string());
            lines.extend(self.productive_searches.iter().map(|search| {
                format!(
                    "- \"{}\" (hit rate {:.0}%, relevance {:.2})",
                    search.query,
                    search.hit_rate * 100.0,
                    search.relevance_score
                )
            }));
        }

        if !self.dead_end_searches.is_empty() {
            lines.push(String::new());
            lines.push("Dead ends (avoid):".to_string());
            lines.extend(self.dead_end_searches.iter().map(|query| format!("- \"{query}\"")));
        }

        if !self.source_priorities.is_empty() {
            let mut sources: Vec<(&String, &f64)> = self.source_priorities.iter().collect();
            sources.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
            lines.push(String::new());
            lines.push("Source priorities:".to_string());
            lines.extend(
                sources
                    .into_iter()
                    .map(|(source, priority)| format!("- {source}: {priority:.2}")),
            );
        }

        if !self.cross_platform_topics.is_empty() {
            lines.push(String::new());
            lines.push("Cross-platform topics:".to_string());
            lines.extend(self.cross_platform_topics.iter().map(|topic| {
                format!(
                    "- {} [{}] strength {:.2}",
                    topic.topic,
                    topic.sources.join(", "),
                    topic.strength
                )
            }));
        }

        if !self.recommended_tool_sequence.is_empty() {
            lines.push(String::new());
            lines.push(format!(
                "Recommended opening sequence: {}",
                self.recommended_tool_sequence.join(" -> ")
            ));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
