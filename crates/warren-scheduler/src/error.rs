//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid scheduler or policy configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fetching the target set from the persistence collaborator failed.
    #[error("failed to fetch targets: {0}")]
    FetchTargets(String),

    /// The idempotency ledger could not be read or written.
    #[error("side effect ledger error: {0}")]
    Ledger(String),

    /// A synchronous fault in the orchestration logic itself.
    #[error("scheduling fault: {0}")]
    SchedulingFault(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single target within a cycle.
#[derive(Debug, Error)]
pub enum ItemError {
    /// The check itself failed after retries.
    #[error(transparent)]
    Check(#[from] crate::ClassifiedError),

    /// The ledger or another collaborator failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
