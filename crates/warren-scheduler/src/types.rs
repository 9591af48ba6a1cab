//! Scheduler types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::SchedulerError;
use crate::executor::ExecutionProgress;
use crate::side_effect::SideEffectOutcome;

/// Per-deployment scheduler settings, supplied at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Period of the recurring cycle timer.
    pub check_interval: Duration,
    /// Maximum targets checked concurrently within a cycle.
    pub concurrency: usize,
}

impl SchedulerConfig {
    /// Create a config, rejecting a zero interval or zero concurrency.
    pub fn new(check_interval: Duration, concurrency: usize) -> Result<Self, SchedulerError> {
        if check_interval.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "check interval must be greater than zero".to_string(),
            ));
        }
        if concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            check_interval,
            concurrency,
        })
    }
}

/// Aggregate result of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    /// Monitor that ran the cycle.
    pub monitor: String,
    /// Wall-clock start of the cycle.
    pub started_at: DateTime<Utc>,
    /// Targets found by the fetch.
    pub targets: usize,
    pub successes: usize,
    pub errors: usize,
    /// Notifications dispatched this cycle.
    pub sent: usize,
    /// Targets skipped because their marker already existed.
    pub already_sent: usize,
    /// Notifications that failed and will be retried next cycle.
    pub send_failed: usize,
    pub elapsed_ms: u64,
    /// Cycle-level failure (fetch error or panic), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleSummary {
    pub(crate) fn new(monitor: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            monitor: monitor.to_string(),
            started_at,
            targets: 0,
            successes: 0,
            errors: 0,
            sent: 0,
            already_sent: 0,
            send_failed: 0,
            elapsed_ms: 0,
            error: None,
        }
    }

    pub(crate) fn apply_progress(&mut self, progress: &ExecutionProgress) {
        self.targets = progress.total;
        self.successes = progress.success_count;
        self.errors = progress.error_count;
    }

    pub(crate) fn apply_outcome(&mut self, outcome: &SideEffectOutcome) {
        match outcome {
            SideEffectOutcome::Sent => self.sent += 1,
            SideEffectOutcome::AlreadySent => self.already_sent += 1,
            SideEffectOutcome::SendFailed { .. } => self.send_failed += 1,
            SideEffectOutcome::NotApplicable => {}
        }
    }

    /// Whether the cycle ran to completion without a cycle-level failure.
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }

    /// Targets processed per second.
    pub fn throughput(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return self.targets as f64;
        }
        self.targets as f64 * 1000.0 / self.elapsed_ms as f64
    }
}
