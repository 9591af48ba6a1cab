//! Idempotent side effects.
//!
//! A side effect (alert, reminder email) is performed at most once per
//! [`SideEffectKey`]. The marker is written only after the notifier reports
//! success, so a failed send is retried on the next cycle instead of being lost.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::SchedulerError;

/// Identifies one side effect for one target, e.g. `license-42` / `expiry-7d:2026-11-01`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SideEffectKey {
    pub target_id: String,
    pub kind: String,
}

impl SideEffectKey {
    pub fn new(target_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for SideEffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_id, self.kind)
    }
}

/// Persistence collaborator for idempotency markers.
///
/// `record_side_effect` must be atomic with respect to concurrent writers
/// (an insert guarded by a uniqueness constraint).
#[async_trait]
pub trait SideEffectLedger: Send + Sync {
    /// Whether the side effect has already been performed.
    async fn has_side_effect(&self, key: &SideEffectKey) -> Result<bool, SchedulerError>;

    /// Record the side effect. Returns `false` if the marker already existed.
    async fn record_side_effect(&self, key: &SideEffectKey) -> Result<bool, SchedulerError>;
}

/// In-process ledger backed by a set.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    markers: Mutex<HashSet<SideEffectKey>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded markers.
    pub fn len(&self) -> usize {
        self.markers.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SideEffectLedger for MemoryLedger {
    async fn has_side_effect(&self, key: &SideEffectKey) -> Result<bool, SchedulerError> {
        let markers = self
            .markers
            .lock()
            .map_err(|e| SchedulerError::Ledger(e.to_string()))?;
        Ok(markers.contains(key))
    }

    async fn record_side_effect(&self, key: &SideEffectKey) -> Result<bool, SchedulerError> {
        let mut markers = self
            .markers
            .lock()
            .map_err(|e| SchedulerError::Ledger(e.to_string()))?;
        Ok(markers.insert(key.clone()))
    }
}

/// A notification to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Monitor that produced the notification (`broker_alerts`, ...).
    pub source: String,
    pub target_id: String,
    pub subject: String,
    pub body: String,
}

/// Result of a send attempt as reported by the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendReport {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Notification collaborator (email, webhook, alert sink).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> SendReport;
}

/// What happened to a target's side effect this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SideEffectOutcome {
    /// The target did not qualify for a side effect.
    NotApplicable,
    /// Dispatched now and the marker was written.
    Sent,
    /// A marker already existed; nothing was dispatched.
    AlreadySent,
    /// Dispatch failed; no marker, so the next cycle retries.
    SendFailed { error: String },
}

impl SideEffectOutcome {
    /// Combine the outcomes of several side effects on one target.
    ///
    /// A failure wins over a send, a send over an existing marker.
    pub fn merge(self, other: SideEffectOutcome) -> SideEffectOutcome {
        fn rank(outcome: &SideEffectOutcome) -> u8 {
            match outcome {
                SideEffectOutcome::NotApplicable => 0,
                SideEffectOutcome::AlreadySent => 1,
                SideEffectOutcome::Sent => 2,
                SideEffectOutcome::SendFailed { .. } => 3,
            }
        }
        if rank(&other) > rank(&self) { other } else { self }
    }
}

/// Perform the side effect for `key` unless its marker exists.
pub async fn dispatch_once(
    ledger: &dyn SideEffectLedger,
    notifier: &dyn Notifier,
    key: &SideEffectKey,
    notification: &Notification,
) -> Result<SideEffectOutcome, SchedulerError> {
    if ledger.has_side_effect(key).await? {
        debug!(key = %key, "side effect already performed");
        return Ok(SideEffectOutcome::AlreadySent);
    }

    let report = notifier.send(notification).await;
    if !report.success {
        let error = report
            .error
            .unwrap_or_else(|| "notifier reported failure".to_string());
        warn!(key = %key, error = %error, "notification failed, will retry next cycle");
        return Ok(SideEffectOutcome::SendFailed { error });
    }

    if !ledger.record_side_effect(key).await? {
        warn!(key = %key, "side effect marker was written concurrently");
    }
    info!(key = %key, subject = %notification.subject, "notification sent");
    Ok(SideEffectOutcome::Sent)
}
