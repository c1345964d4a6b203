use serde::{Deserialize, Serialize};

/// Main configuration structure for the exploration engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Archive storage configuration
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Cycle limits
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Strategy evolution thresholds and caps
    #[serde(default)]
    pub evolver: EvolverConfig,

    /// Ranked trace sampling
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Archive storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArchiveConfig {
    /// Parent directory; each subject gets its own subdirectory
    #[serde(default = "default_archive_root")]
    pub root: String,
}

fn default_archive_root() -> String {
    ".footprint/archive".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: default_archive_root(),
        }
    }
}

/// Limits for one cycle of runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CycleConfig {
    /// Maximum runs per cycle
    #[serde(default = "default_max_runs")]
    pub max_runs: u32,

    /// Soft budget, checked after each run
    #[serde(default = "default_max_budget_usd")]
    pub max_budget_usd: f64,

    /// Evolve a new strategy whenever the archive run count is a multiple of this
    #[serde(default = "default_evolve_every_n")]
    pub evolve_every_n: u32,
}

const fn default_max_runs() -> u32 {
    5
}

const fn default_max_budget_usd() -> f64 {
    1.0
}

const fn default_evolve_every_n() -> u32 {
    3
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_runs: default_max_runs(),
            max_budget_usd: default_max_budget_usd(),
            evolve_every_n: default_evolve_every_n(),
        }
    }
}

/// Thresholds and caps used when evolving a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvolverConfig {
    #[serde(default = "default_max_productive_searches")]
    pub max_productive_searches: usize,

    #[serde(default = "default_max_dead_ends")]
    pub max_dead_ends: usize,

    #[serde(default = "default_max_cross_platform_topics")]
    pub max_cross_platform_topics: usize,

    /// A query is productive only when its hit rate is strictly above this
    #[serde(default = "default_min_hit_rate")]
    pub min_hit_rate: f64,

    /// Lower bound on the weight a useful hit contributes
    #[serde(default = "default_relevance_weight_floor")]
    pub relevance_weight_floor: f64,

    /// Traces in which a query must come back empty to be a dead end
    #[serde(default = "default_dead_end_min_traces")]
    pub dead_end_min_traces: usize,
}

const fn default_max_productive_searches() -> usize {
    20
}

const fn default_max_dead_ends() -> usize {
    20
}

const fn default_max_cross_platform_topics() -> usize {
    10
}

const fn default_min_hit_rate() -> f64 {
    0.5
}

const fn default_relevance_weight_floor() -> f64 {
    0.1
}

const fn default_dead_end_min_traces() -> usize {
    2
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self {
            max_productive_searches: default_max_productive_searches(),
            max_dead_ends: default_max_dead_ends(),
            max_cross_platform_topics: default_max_cross_platform_topics(),
            min_hit_rate: default_min_hit_rate(),
            relevance_weight_floor: default_relevance_weight_floor(),
            dead_end_min_traces: default_dead_end_min_traces(),
        }
    }
}

/// Ranked trace sampling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SamplingConfig {
    /// Multiplier on `ln(1 + age_days)`
    #[serde(default = "default_recency_penalty")]
    pub recency_penalty: f64,
}

const fn default_recency_penalty() -> f64 {
    0.1
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            recency_penalty: default_recency_penalty(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation policy for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
