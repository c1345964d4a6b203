use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Archive root cannot be empty")]
    EmptyArchiveRoot,

    #[error("Invalid max_runs: {0}. Must be at least 1")]
    InvalidMaxRuns(u32),

    #[error("Invalid max_budget_usd: {0}. Must be a positive number")]
    InvalidBudget(f64),

    #[error("Invalid evolve_every_n: {0}. Must be at least 1")]
    InvalidEvolveEveryN(u32),

    #[error("Invalid min_hit_rate: {0}. Must be in [0, 1)")]
    InvalidHitRate(f64),

    #[error("Invalid relevance_weight_floor: {0}. Must be in [0, 1]")]
    InvalidWeightFloor(f64),

    #[error("Invalid recency_penalty: {0}. Must be non-negative")]
    InvalidRecencyPenalty(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .footprint/config.yaml (project config)
    /// 3. .footprint/local.yaml (local overrides, optional)
    /// 4. Environment variables (FOOTPRINT_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".footprint/config.yaml"))
            .merge(Yaml::file(".footprint/local.yaml"))
            .merge(Env::prefixed("FOOTPRINT_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.archive.root.trim().is_empty() {
            return Err(ConfigError::EmptyArchiveRoot);
        }

        let cycle = &config.cycle;
        if cycle.max_runs == 0 {
            return Err(ConfigError::InvalidMaxRuns(cycle.max_runs));
        }
        if !cycle.max_budget_usd.is_finite() || cycle.max_budget_usd <= 0.0 {
            return Err(ConfigError::InvalidBudget(cycle.max_budget_usd));
        }
        if cycle.evolve_every_n == 0 {
            return Err(ConfigError::InvalidEvolveEveryN(cycle.evolve_every_n));
        }

        let evolver = &config.evolver;
        if !(0.0..1.0).contains(&evolver.min_hit_rate) {
            return Err(ConfigError::InvalidHitRate(evolver.min_hit_rate));
        }
        if !(0.0..=1.0).contains(&evolver.relevance_weight_floor) {
            return Err(ConfigError::InvalidWeightFloor(evolver.relevance_weight_floor));
        }
        for (name, cap) in [
            ("max_productive_searches", evolver.max_productive_searches),
            ("max_dead_ends", evolver.max_dead_ends),
            ("max_cross_platform_topics", evolver.max_cross_platform_topics),
            ("dead_end_min_traces", evolver.dead_end_min_traces),
        ] {
            if cap == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "evolver.{name} must be at least 1"
                )));
            }
        }

        let penalty = config.sampling.recency_penalty;
        if !penalty.is_finite() || penalty < 0.0 {
            return Err(ConfigError::InvalidRecencyPenalty(penalty));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        Ok(())
    }
}
