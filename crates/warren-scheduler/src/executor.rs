//! Bounded-concurrency executor.
//!
//! Work items live in an arena indexed by a dispatch cursor. A fixed-size slot
//! table holds the arena index of every in-flight item, so no more than
//! `concurrency` operations are ever unsettled. When a slot frees up, the next
//! item under the cursor takes it (sliding window, not batches).

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::SchedulerError;
use crate::clock::Clock;

/// Delay before retrying a dispatch that faulted synchronously.
pub const DISPATCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Dispatch attempts per item before the item is counted as failed.
pub const MAX_DISPATCH_ATTEMPTS: u32 = 3;

/// Counters for one executor run.
///
/// Monotonically non-decreasing; `success_count + error_count == completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionProgress {
    pub completed: usize,
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
}

impl ExecutionProgress {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: ItemOutcome) {
        self.completed += 1;
        match outcome {
            ItemOutcome::Success => self.success_count += 1,
            ItemOutcome::Failure => self.error_count += 1,
        }
    }

    /// Whether every item has settled.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Terminal state of a single item, from the executor's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Success,
    Failure,
}

/// Progress callback invoked after every settlement.
pub type ProgressCallback<'a> = &'a (dyn Fn(&ExecutionProgress) + Sync);

/// Occupant of an executor slot.
#[derive(Debug, Clone, Copy)]
struct Slot {
    item: usize,
    dispatch_faults: u32,
}

enum SlotEvent {
    Settled { slot: usize, outcome: ItemOutcome },
    Redispatch { slot: usize },
}

/// Drives work items through a per-item operation with at most `concurrency`
/// in flight.
#[derive(Clone)]
pub struct BoundedExecutor {
    concurrency: usize,
    clock: Arc<dyn Clock>,
}

impl BoundedExecutor {
    /// Create an executor. `concurrency` must be at least 1.
    pub fn new(concurrency: usize, clock: Arc<dyn Clock>) -> Result<Self, SchedulerError> {
        if concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self { concurrency, clock })
    }

    /// Concurrency budget.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `per_item` over every item and return the final counters.
    ///
    /// Items are dispatched in input order. `Ok` settles as a success and `Err`
    /// as a failure; `per_item` is expected to log its own errors. A panic inside
    /// the operation counts as a failure. Returns only after every item has
    /// settled.
    pub async fn run<'a, I, T, E, F, Fut>(
        &self,
        items: Vec<I>,
        per_item: F,
        on_progress: Option<ProgressCallback<'a>>,
    ) -> ExecutionProgress
    where
        I: Clone + Send + 'a,
        F: Fn(I) -> Fut + Sync + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        let total = items.len();
        let mut progress = ExecutionProgress::new(total);
        if total == 0 {
            return progress;
        }

        let width = self.concurrency.min(total);
        let mut slots: Vec<Option<Slot>> = vec![None; width];
        let mut cursor = 0usize;
        let mut in_flight: FuturesUnordered<BoxFuture<'a, SlotEvent>> = FuturesUnordered::new();

        for (index, slot) in slots.iter_mut().enumerate() {
            let mut occupant = Slot {
                item: cursor,
                dispatch_faults: 0,
            };
            cursor += 1;
            in_flight.push(self.dispatch(index, &mut occupant, &items, &per_item));
            *slot = Some(occupant);
        }

        while let Some(event) = in_flight.next().await {
            match event {
                SlotEvent::Settled { slot, outcome } => {
                    progress.record(outcome);
                    report_progress(on_progress, &progress);
                    slots[slot] = None;

                    if cursor < total {
                        let mut occupant = Slot {
                            item: cursor,
                            dispatch_faults: 0,
                        };
                        cursor += 1;
                        in_flight.push(self.dispatch(slot, &mut occupant, &items, &per_item));
                        slots[slot] = Some(occupant);
                    }
                }
                SlotEvent::Redispatch { slot } => match slots[slot].as_mut() {
                    Some(occupant) => {
                        in_flight.push(self.dispatch(slot, occupant, &items, &per_item));
                    }
                    None => {
                        error!(slot, "redispatch requested for an empty slot");
                    }
                },
            }
        }

        if !progress.is_complete() {
            error!(
                completed = progress.completed,
                total, "executor drained with unsettled items"
            );
        }
        progress
    }

    /// Start the operation for the item occupying `slot`.
    ///
    /// A synchronous panic while building the operation is a scheduling fault:
    /// the slot stays reserved and a redispatch is scheduled after
    /// [`DISPATCH_RETRY_DELAY`], up to [`MAX_DISPATCH_ATTEMPTS`].
    fn dispatch<'a, I, T, E, F, Fut>(
        &self,
        slot: usize,
        occupant: &mut Slot,
        items: &[I],
        per_item: &F,
    ) -> BoxFuture<'a, SlotEvent>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        let item = items[occupant.item].clone();
        match catch_unwind(AssertUnwindSafe(|| per_item(item))) {
            Ok(operation) => Box::pin(async move {
                let outcome = match AssertUnwindSafe(operation).catch_unwind().await {
                    Ok(Ok(_)) => ItemOutcome::Success,
                    Ok(Err(_)) => ItemOutcome::Failure,
                    Err(_) => {
                        error!(slot, "work item panicked");
                        ItemOutcome::Failure
                    }
                };
                SlotEvent::Settled { slot, outcome }
            }),
            Err(_) => {
                occupant.dispatch_faults += 1;
                let fault = SchedulerError::SchedulingFault(format!(
                    "dispatch of item {} panicked",
                    occupant.item
                ));

                if occupant.dispatch_faults >= MAX_DISPATCH_ATTEMPTS {
                    error!(
                        slot,
                        item = occupant.item,
                        attempts = occupant.dispatch_faults,
                        error = %fault,
                        "giving up on dispatch, counting item as failed"
                    );
                    return Box::pin(async move {
                        SlotEvent::Settled {
                            slot,
                            outcome: ItemOutcome::Failure,
                        }
                    });
                }

                error!(
                    slot,
                    item = occupant.item,
                    attempts = occupant.dispatch_faults,
                    retry_ms = DISPATCH_RETRY_DELAY.as_millis() as u64,
                    error = %fault,
                    "dispatch failed, retrying"
                );
                let delay = self.clock.sleep(DISPATCH_RETRY_DELAY);
                Box::pin(async move {
                    delay.await;
                    SlotEvent::Redispatch { slot }
                })
            }
        }
    }
}

fn report_progress(on_progress: Option<ProgressCallback<'_>>, progress: &ExecutionProgress) {
    let Some(callback) = on_progress else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| callback(progress))).is_err() {
        warn!(
            completed = progress.completed,
            total = progress.total,
            "progress callback panicked"
        );
    }
}

/// Logs progress at roughly every 10% of completion, with throughput and an
/// estimate of the time remaining.
pub struct ProgressLog {
    label: String,
    clock: Arc<dyn Clock>,
    started: Instant,
    last_decile: AtomicUsize,
}

impl ProgressLog {
    pub fn new(label: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            label: label.into(),
            clock,
            started,
            last_decile: AtomicUsize::new(0),
        }
    }

    /// Record a progress update; logs when a new 10% boundary is crossed.
    ///
    /// Returns whether a line was logged.
    pub fn observe(&self, progress: &ExecutionProgress) -> bool {
        if progress.total == 0 {
            return false;
        }
        let decile = progress.completed * 10 / progress.total;
        if decile == 0 || self.last_decile.fetch_max(decile, Ordering::SeqCst) >= decile {
            return false;
        }

        let elapsed = self.clock.now().saturating_duration_since(self.started);
        let elapsed_secs = elapsed.as_secs_f64();
        let throughput = if elapsed_secs > 0.0 {
            progress.completed as f64 / elapsed_secs
        } else {
            0.0
        };
        let remaining = progress.total - progress.completed;
        let eta_ms = if throughput > 0.0 {
            (remaining as f64 / throughput * 1000.0) as u64
        } else {
            0
        };

        info!(
            label = %self.label,
            completed = progress.completed,
            total = progress.total,
            percent = decile * 10,
            successes = progress.success_count,
            errors = progress.error_count,
            elapsed_ms = elapsed.as_millis() as u64,
            throughput_per_sec = throughput,
            eta_ms,
            "progress"
        );
        true
    }
}
