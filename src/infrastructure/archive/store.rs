//! File-backed, append-only archive of traces and strategies for one subject.
//!
//! Layout under `<root>/<subject>/`:
//! - `traces/trace_{run_id}.json`
//! - `strategies/strategy_v{version}.json`
//!
//! Every file is written to a temporary file in the same directory and then
//! published under its final name without overwriting, so a torn write never
//! appears as a record. Publishing a strategy file that already exists fails
//! with `VersionConflict`, which makes version assignment atomic across
//! writers sharing the same directory.
//!
//! A strategy file that cannot be loaded still reserves its version number.

use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info, warn};

use super::sampling::rank_traces;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExplorationStrategy, ExplorationTrace, SamplingConfig};

const TRACES_DIR: &str = "traces";
const STRATEGIES_DIR: &str = "strategies";
const TRACE_PREFIX: &str = "trace_";
const STRATEGY_PREFIX: &str = "strategy_v";

/// Durable history of exploration runs for a single subject.
#[derive(Debug)]
pub struct Archive {
    subject: String,
    traces_dir: PathBuf,
    strategies_dir: PathBuf,
    traces: Vec<ExplorationTrace>,
    strategies: Vec<ExplorationStrategy>,
    /// Highest `strategy_v{N}` on disk, loadable or not.
    reserved_version: u32,
    sampling: SamplingConfig,
}

impl Archive {
    /// Open (or create) the archive for `subject` under `root`.
    pub async fn open(root: impl AsRef<Path>, subject: &str) -> DomainResult<Self> {
        Self::open_with(root, subject, SamplingConfig::default()).await
    }

    /// Open with explicit sampling parameters.
    ///
    /// Files that fail to read or parse are skipped with a warning.
    pub async fn open_with(
        root: impl AsRef<Path>,
        subject: &str,
        sampling: SamplingConfig,
    ) -> DomainResult<Self> {
        validate_file_component("subject", subject)?;

        let base = root.as_ref().join(subject);
        let traces_dir = base.join(TRACES_DIR);
        let strategies_dir = base.join(STRATEGIES_DIR);
        fs::create_dir_all(&traces_dir).await?;
        fs::create_dir_all(&strategies_dir).await?;

        let mut traces: Vec<ExplorationTrace> = load_records::<ExplorationTrace>(&traces_dir, TRACE_PREFIX)
            .await?
            .into_iter()
            .filter_map(|(stem, trace): (String, ExplorationTrace)| {
                if trace.run_id == stem {
                    Some(trace)
                } else {
                    warn!(file_run_id = %stem, run_id = %trace.run_id, "trace file name does not match its run id, skipping");
                    None
                }
            })
            .collect();
        traces.sort_by(chronological);

        let mut strategies: Vec<ExplorationStrategy> = load_records::<ExplorationStrategy>(&strategies_dir, STRATEGY_PREFIX)
            .await?
            .into_iter()
            .filter_map(|(stem, strategy): (String, ExplorationStrategy)| {
                if stem.parse::<u32>().ok() == Some(strategy.version) {
                    Some(strategy)
                } else {
                    warn!(file_version = %stem, version = strategy.version, "strategy file name does not match its version, skipping");
                    None
                }
            })
            .collect();
        strategies.sort_by_key(|strategy| strategy.version);

        let reserved_version = highest_strategy_file_version(&strategies_dir).await?;
        let loaded_version = strategies.last().map_or(0, |strategy| strategy.version);
        if reserved_version > loaded_version {
            warn!(
                subject,
                reserved_version,
                loaded_version,
                "newest strategy files are unreadable, their versions stay reserved"
            );
        }

        info!(
            subject,
            traces = traces.len(),
            strategies = strategies.len(),
            reserved_version,
            "archive loaded"
        );

        Ok(Self {
            subject: subject.to_string(),
            traces_dir,
            strategies_dir,
            traces,
            strategies,
            reserved_version,
            sampling,
        })
    }

    /// Subject this archive belongs to.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// All traces, oldest first.
    pub fn traces(&self) -> &[ExplorationTrace] {
        &self.traces
    }

    /// All strategies, lowest version first.
    pub fn strategies(&self) -> &[ExplorationStrategy] {
        &self.strategies
    }

    /// Total number of archived traces.
    pub fn run_count(&self) -> u64 {
        self.traces.len() as u64
    }

    /// Sum of the cost of every archived run.
    pub fn total_cost_usd(&self) -> f64 {
        self.traces.iter().map(|trace| trace.cost_usd).sum()
    }

    /// Persist a trace and append it to the in-memory history.
    pub async fn add_trace(&mut self, trace: ExplorationTrace) -> DomainResult<()> {
        validate_file_component("run id", &trace.run_id)?;
        let path = self
            .traces_dir
            .join(format!("{TRACE_PREFIX}{}.json", trace.run_id));

        match write_new(&path, &trace).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(DomainError::DuplicateTrace(trace.run_id));
            }
            Err(err) => return Err(err.into()),
        }

        debug!(run_id = %trace.run_id, path = %path.display(), "trace archived");
        self.traces.push(trace);
        Ok(())
    }

    /// Persist a strategy version and append it to the in-memory history.
    ///
    /// The version must exceed every version already known, and its file must
    /// not exist yet.
    pub async fn save_strategy(&mut self, strategy: ExplorationStrategy) -> DomainResult<()> {
        let latest = self.latest_version();
        if strategy.version <= latest {
            return Err(DomainError::VersionConflict {
                version: strategy.version,
            });
        }

        let path = self
            .strategies_dir
            .join(format!("{STRATEGY_PREFIX}{}.json", strategy.version));

        match write_new(&path, &strategy).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(DomainError::VersionConflict {
                    version: strategy.version,
                });
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            subject = %self.subject,
            version = strategy.version,
            derived_from_runs = strategy.derived_from_runs,
            "strategy saved"
        );
        self.reserved_version = self.reserved_version.max(strategy.version);
        self.strategies.push(strategy);
        Ok(())
    }

    /// Strategy with the highest version, if any has been evolved.
    pub fn latest_strategy(&self) -> Option<&ExplorationStrategy> {
        self.strategies.iter().max_by_key(|strategy| strategy.version)
    }

    /// Highest strategy version taken, 0 when none exists.
    ///
    /// Counts versions whose files exist but could not be loaded, so it can
    /// exceed the version of [`Self::latest_strategy`].
    pub fn latest_version(&self) -> u32 {
        self.latest_strategy()
            .map_or(0, |strategy| strategy.version)
            .max(self.reserved_version)
    }

    /// Up to `limit` traces, newest first.
    pub fn recent_traces(&self, limit: usize) -> Vec<&ExplorationTrace> {
        let mut traces: Vec<&ExplorationTrace> = self.traces.iter().collect();
        traces.sort_by(|a, b| chronological(b, a));
        traces.truncate(limit);
        traces
    }

    /// Ranked selection of `k` traces favouring high scores and recency.
    pub fn sample_traces(&self, k: usize) -> Vec<&ExplorationTrace> {
        self.sample_traces_at(k, Utc::now())
    }

    /// [`Self::sample_traces`] against an explicit clock.
    pub fn sample_traces_at(&self, k: usize, now: DateTime<Utc>) -> Vec<&ExplorationTrace> {
        rank_traces(&self.traces, k, now, self.sampling.recency_penalty)
    }
}

/// Order by timestamp (unparsable first), then run id.
fn chronological(a: &ExplorationTrace, b: &ExplorationTrace) -> Ordering {
    a.parsed_timestamp()
        .cmp(&b.parsed_timestamp())
        .then_with(|| a.run_id.cmp(&b.run_id))
}

/// Reject values that would escape or break the archive layout.
fn validate_file_component(what: &str, value: &str) -> DomainResult<()> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if invalid {
        return Err(DomainError::ValidationFailed(format!(
            "{what} is not usable as a file name: {value:?}"
        )));
    }
    Ok(())
}

/// Serialize `record` into a file that must not already exist.
///
/// The bytes go to a synced temporary file in the same directory first and
/// are then linked into place, failing with `AlreadyExists` if `path` exists.
async fn write_new<T: Serialize>(path: &Path, record: &T) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(record)?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| std::io::Error::other(format!("{} has no parent directory", path.display())))?;
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut staged = NamedTempFile::new_in(&dir)?;
        std::io::Write::write_all(&mut staged, &json)?;
        staged.as_file().sync_all()?;
        staged.persist_noclobber(&target).map_err(|err| err.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

/// Highest `N` among `strategy_v{N}.json` names in `dir`, whatever their contents.
async fn highest_strategy_file_version(dir: &Path) -> DomainResult<u32> {
    let mut highest = 0;
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let version = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_suffix(".json"))
            .and_then(|name| name.strip_prefix(STRATEGY_PREFIX))
            .and_then(|stem| stem.parse::<u32>().ok());
        if let Some(version) = version {
            highest = highest.max(version);
        }
    }

    Ok(highest)
}

/// Load every `{prefix}{stem}.json` record in `dir`, returning `(stem, record)`.
async fn load_records<T: DeserializeOwned>(dir: &Path, prefix: &str) -> DomainResult<Vec<(String, T)>> {
    let mut records = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(stem) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(".json"))
            .and_then(|name| name.strip_prefix(prefix))
            .map(str::to_string)
        else {
            continue;
        };

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable archive file, skipping");
                continue;
            }
        };

        match serde_json::from_str::<T>(&contents) {
            Ok(record) => records.push((stem, record)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt archive file, skipping");
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn trace_at(id: &str, at: DateTime<Utc>, score: f64) -> ExplorationTrace {
        let mut trace = ExplorationTrace::with_id(id, at, 0);
        trace.profile_score = score;
        trace.cost_usd = 0.25;
        trace
    }

    #[tokio::test]
    async fn test_add_trace_persists_one_file_per_run() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(dir.path(), "alice").await.unwrap();

        archive.add_trace(trace_at("run-1", Utc::now(), 0.5)).await.unwrap();

        assert_eq!(archive.run_count(), 1);
        assert!(dir.path().join("alice/traces/trace_run-1.json").exists());
    }

    #[tokio::test]
    async fn test_duplicate_trace_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(dir.path(), "alice").await.unwrap();
        archive.add_trace(trace_at("run-1", Utc::now(), 0.5)).await.unwrap();

        let err = archive
            .add_trace(trace_at("run-1", Utc::now(), 0.9))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateTrace(id) if id == "run-1"));
        assert_eq!(archive.run_count(), 1);
    }

    #[tokio::test]
    async fn test_strategy_versions_coexist_and_latest_is_max() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(dir.path(), "alice").await.unwrap();
        assert!(archive.latest_strategy().is_none());

        archive.save_strategy(ExplorationStrategy::empty(1)).await.unwrap();
        archive.save_strategy(ExplorationStrategy::empty(2)).await.unwrap();

        assert_eq!(archive.latest_version(), 2);
        assert!(dir.path().join("alice/strategies/strategy_v1.json").exists());
        assert!(dir.path().join("alice/strategies/strategy_v2.json").exists());
    }

    #[tokio::test]
    async fn test_stale_strategy_version_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(dir.path(), "alice").await.unwrap();
        archive.save_strategy(ExplorationStrategy::empty(1)).await.unwrap();

        let err = archive
            .save_strategy(ExplorationStrategy::empty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict { version: 1 }));
    }

    #[tokio::test]
    async fn test_concurrent_writer_version_collision_detected_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut first = Archive::open(dir.path(), "alice").await.unwrap();
        let mut second = Archive::open(dir.path(), "alice").await.unwrap();

        first.save_strategy(ExplorationStrategy::empty(1)).await.unwrap();
        let err = second
            .save_strategy(ExplorationStrategy::empty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict { version: 1 }));
    }

    #[tokio::test]
    async fn test_unreadable_strategy_file_still_reserves_its_version() {
        let dir = TempDir::new().unwrap();
        let strategies = dir.path().join("alice/strategies");
        std::fs::create_dir_all(&strategies).unwrap();
        std::fs::write(strategies.join("strategy_v2.json"), "{ torn write").unwrap();

        let mut archive = Archive::open(dir.path(), "alice").await.unwrap();
        assert!(archive.latest_strategy().is_none());
        assert_eq!(archive.latest_version(), 2);

        let err = archive
            .save_strategy(ExplorationStrategy::empty(2))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict { version: 2 }));

        archive.save_strategy(ExplorationStrategy::empty(3)).await.unwrap();
        assert_eq!(archive.latest_version(), 3);
        assert_eq!(archive.latest_strategy().map(|s| s.version), Some(3));
    }

    #[tokio::test]
    async fn test_writes_leave_no_staging_files_behind() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(dir.path(), "alice").await.unwrap();
        archive.add_trace(trace_at("run-1", Utc::now(), 0.5)).await.unwrap();
        archive.save_strategy(ExplorationStrategy::empty(1)).await.unwrap();

        let mut other = Archive::open(dir.path(), "alice").await.unwrap();
        let err = other
            .add_trace(trace_at("run-1", Utc::now(), 0.9))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateTrace(_)));

        let names = |sub: &str| -> Vec<String> {
            std::fs::read_dir(dir.path().join(sub))
                .unwrap()
                .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
                .collect()
        };
        assert_eq!(names("alice/traces"), vec!["trace_run-1.json".to_string()]);
        assert_eq!(names("alice/strategies"), vec!["strategy_v1.json".to_string()]);
    }

    #[tokio::test]
    async fn test_recent_traces_newest_first() {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::open(dir.path(), "alice").await.unwrap();
        let now = Utc::now();
        archive.add_trace(trace_at("old", now - Duration::days(2), 0.5)).await.unwrap();
        archive.add_trace(trace_at("new", now, 0.5)).await.unwrap();
        archive.add_trace(trace_at("mid", now - Duration::days(1), 0.5)).await.unwrap();

        let recent: Vec<&str> = archive
            .recent_traces(2)
            .into_iter()
            .map(|t| t.run_id.as_str())
            .collect();
        assert_eq!(recent, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn test_reload_restores_history() {
        let dir = TempDir::new().unwrap();
        {
            let mut archive = Archive::open(dir.path(), "alice").await.unwrap();
            archive.add_trace(trace_at("run-1", Utc::now(), 0.4)).await.unwrap();
            archive.add_trace(trace_at("run-2", Utc::now(), 0.8)).await.unwrap();
            archive.save_strategy(ExplorationStrategy::empty(1)).await.unwrap();
        }

        let archive = Archive::open(dir.path(), "alice").await.unwrap();
        assert_eq!(archive.run_count(), 2);
        assert_eq!(archive.latest_version(), 1);
        assert!((archive.total_cost_usd() - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_subjects_are_isolated() {
        let dir = TempDir::new().unwrap();
        let mut alice = Archive::open(dir.path(), "alice").await.unwrap();
        alice.add_trace(trace_at("run-1", Utc::now(), 0.4)).await.unwrap();

        let bob = Archive::open(dir.path(), "bob").await.unwrap();
        assert_eq!(bob.run_count(), 0);
    }

    #[tokio::test]
    async fn test_path_like_subject_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Archive::open(dir.path(), "../escape").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }
}
