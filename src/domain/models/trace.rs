//! Exploration trace: the full record of one perception run.
//!
//! A trace is created by the cycle controller once a run completes, gets its
//! derived fields filled in exactly once by reflection, and is then archived
//! and never touched again. Field names serialize in camelCase so the JSON
//! files match the documented wire format.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which tool produced a search record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTool {
    /// Plain search.
    Search,
    /// Cross-reference lookup.
    CrossReference,
}

/// One tool invocation made during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    /// Tool name.
    pub name: String,
    /// Arguments as passed to the tool.
    pub args: serde_json::Value,
    /// Size of the tool's result.
    pub result_size_bytes: u64,
    /// Whether the tool returned nothing.
    pub was_empty: bool,
    /// Time the call took.
    pub elapsed_ms: u64,
}

impl ToolCallRecord {
    /// Source named by a browse-style call, if any.
    ///
    /// Only calls whose name starts with `browse` and whose arguments carry an
    /// explicit string `source` field count.
    pub fn browsed_source(&self) -> Option<&str> {
        if !self.name.starts_with("browse") {
            return None;
        }
        self.args.get("source").and_then(serde_json::Value::as_str)
    }
}

/// One search issued during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRecord {
    /// Query text.
    pub query: String,
    /// Tool that ran the query.
    pub tool: SearchTool,
    /// Whether the query found nothing.
    pub was_empty: bool,
    /// Number of results returned.
    pub result_count: u64,
}

/// A topic looked up across several data sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferenceRecord {
    /// Topic looked up.
    pub topic: String,
    /// Sources with at least one match.
    pub sources_matched: BTreeSet<String>,
    /// Matches summed over all sources.
    pub total_matches: u64,
}

/// A cross-reference that matched at least two sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredConnection {
    /// Topic shared by the sources.
    pub topic: String,
    /// Sources that matched the topic.
    pub sources: BTreeSet<String>,
    /// Matches summed over those sources.
    pub matches: u64,
}

/// Complete record of one exploration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationTrace {
    /// Unique id of the run.
    pub run_id: String,
    /// RFC 3339 creation time. Kept as text so foreign writers with odd
    /// timestamps still load.
    pub timestamp: String,
    /// Strategy version active when the run started (0 = none).
    pub strategy_version: u32,
    /// Tool calls in invocation order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Searches in issue order.
    pub searches: Vec<SearchRecord>,
    /// Cross-reference lookups in issue order.
    pub cross_references: Vec<CrossReferenceRecord>,

    /// Queries that contributed to the output. Filled by reflection.
    #[serde(default)]
    pub useful_searches: Vec<String>,
    /// Queries that did not. Filled by reflection.
    #[serde(default)]
    pub wasted_searches: Vec<String>,
    /// Multi-source cross-references. Filled by reflection.
    #[serde(default)]
    pub discovered_connections: Vec<DiscoveredConnection>,

    /// Quality of the produced profile in [0, 1].
    pub profile_score: f64,
    /// Cost of the run in USD.
    pub cost_usd: f64,
    /// Wall-clock duration of the run.
    pub duration_seconds: f64,
}

impl ExplorationTrace {
    /// Start a trace with a fresh run id and the current time.
    pub fn new(strategy_version: u32) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), Utc::now(), strategy_version)
    }

    /// Start a trace with a given run id and time.
    pub fn with_id(run_id: impl Into<String>, timestamp: DateTime<Utc>, strategy_version: u32) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: timestamp.to_rfc3339(),
            strategy_version,
            tool_calls: Vec::new(),
            searches: Vec::new(),
            cross_references: Vec::new(),
            useful_searches: Vec::new(),
            wasted_searches: Vec::new(),
            discovered_connections: Vec::new(),
            profile_score: 0.0,
            cost_usd: 0.0,
            duration_seconds: 0.0,
        }
    }

    /// Parsed timestamp, or `None` when the stored text is not RFC 3339.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Whether reflection has populated the derived fields.
    pub fn is_reflected(&self) -> bool {
        !self.useful_searches.is_empty()
            || !self.wasted_searches.is_empty()
            || !self.discovered_connections.is_empty()
    }

    /// Sources this run explored: browse targets plus cross-reference matches.
    pub fn explored_sources(&self) -> BTreeSet<String> {
        let mut sources: BTreeSet<String> = self
            .tool_calls
            .iter()
            .filter_map(ToolCallRecord::browsed_source)
            .map(str::to_string)
            .collect();
        for xref in &self.cross_references {
            sources.extend(xref.sources_matched.iter().cloned());
        }
        sources
    }

    /// Ordered tool-call names.
    pub fn tool_sequence(&self) -> Vec<String> {
        self.tool_calls.iter().map(|call| call.name.clone()).collect()
    }
}
