//! Domain errors for the exploration engine.

use thiserror::Error;

/// Errors surfaced by the archive, the runner port and the cycle loop.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Filesystem failure while reading or writing the archive.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Another strategy already holds this version.
    #[error("Strategy version {version} already exists for this subject")]
    VersionConflict {
        /// Contested version.
        version: u32,
    },

    /// A trace with this run id is already archived.
    #[error("Trace already archived: {0}")]
    DuplicateTrace(String),

    /// The perception runner reported a failure.
    #[error("Perception run failed: {0}")]
    PerceptionFailed(String),

    /// The runner returned an unusable outcome.
    #[error("Invalid perception outcome: {0}")]
    InvalidOutcome(String),

    /// An argument was rejected before any work was done.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
