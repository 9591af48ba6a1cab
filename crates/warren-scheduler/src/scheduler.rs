//! Cycle scheduler implementation.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::executor::{BoundedExecutor, ExecutionProgress, ProgressLog};
use crate::side_effect::SideEffectOutcome;
use crate::{CycleSummary, ItemError, SchedulerConfig, SchedulerError};

/// A monitored domain: where targets come from and what checking one means.
///
/// Implementations wrap their outbound calls in a
/// [`ResilientInvoker`](crate::ResilientInvoker) and route notifications
/// through [`dispatch_once`](crate::dispatch_once).
#[async_trait]
pub trait Monitor: Send + Sync + 'static {
    /// A single target (broker server, license, ...).
    type Target: Clone + Send + Sync + 'static;

    /// Name used in log fields and summaries.
    fn name(&self) -> &str;

    /// Stable identifier of a target.
    fn target_id(&self, target: &Self::Target) -> String;

    /// Fetch the current target set from the persistence collaborator.
    async fn fetch_targets(&self) -> Result<Vec<Self::Target>, SchedulerError>;

    /// Check one target and perform its side effect if it qualifies.
    async fn process(&self, target: Self::Target) -> Result<SideEffectOutcome, ItemError>;
}

/// Running state of the scheduler. Only start/stop mutate it.
#[derive(Default)]
struct CycleState {
    running: bool,
    timer: Option<TimerHandle>,
}

struct TimerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct Inner<M: Monitor> {
    monitor: Arc<M>,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    executor: BoundedExecutor,
    state: Mutex<CycleState>,
    cycle_in_flight: AtomicBool,
}

/// Periodically runs cycles of a [`Monitor`].
///
/// `start` triggers one cycle immediately and then one every
/// `check_interval`. At most one cycle is in flight; a trigger that arrives
/// while a cycle runs is skipped, not queued.
pub struct CycleScheduler<M: Monitor> {
    inner: Arc<Inner<M>>,
}

impl<M: Monitor> Clone for CycleScheduler<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Monitor> CycleScheduler<M> {
    /// Create a stopped scheduler.
    pub fn new(
        monitor: M,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SchedulerError> {
        let executor = BoundedExecutor::new(config.concurrency, Arc::clone(&clock))?;
        Ok(Self {
            inner: Arc::new(Inner {
                monitor: Arc::new(monitor),
                config,
                clock,
                executor,
                state: Mutex::new(CycleState::default()),
                cycle_in_flight: AtomicBool::new(false),
            }),
        })
    }

    /// The monitored domain.
    pub fn monitor(&self) -> &M {
        &self.inner.monitor
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    /// Whether the scheduler has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.inner
            .state
            .lock()
            .map(|state| state.running)
            .unwrap_or(false)
    }

    /// Whether a cycle is executing right now.
    pub fn cycle_in_flight(&self) -> bool {
        self.inner.cycle_in_flight.load(Ordering::Acquire)
    }

    /// Start the recurring timer and trigger a cycle immediately.
    ///
    /// Returns `false` (and does nothing) if already running. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> Result<bool, SchedulerError> {
        let mut state = self.lock_state()?;
        let monitor = self.inner.monitor.name();
        if state.running {
            info!(monitor, "scheduler already running");
            return Ok(false);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.timer_loop(shutdown_rx).await });

        state.running = true;
        state.timer = Some(TimerHandle { shutdown_tx, task });
        info!(
            monitor,
            interval_secs = self.inner.config.check_interval.as_secs(),
            concurrency = self.inner.config.concurrency,
            "scheduler started"
        );
        Ok(true)
    }

    /// Cancel the recurring timer.
    ///
    /// Returns `false` (and does nothing) if already stopped. A cycle already in
    /// flight is left to finish.
    pub fn stop(&self) -> Result<bool, SchedulerError> {
        let mut state = self.lock_state()?;
        let monitor = self.inner.monitor.name();
        if !state.running {
            info!(monitor, "scheduler already stopped");
            return Ok(false);
        }

        state.running = false;
        if let Some(timer) = state.timer.take() {
            let _ = timer.shutdown_tx.send(true);
            timer.task.abort();
        }
        info!(
            monitor,
            cycle_in_flight = self.cycle_in_flight(),
            "scheduler stopped"
        );
        Ok(true)
    }

    /// Run one cycle now, unless one is already in flight.
    ///
    /// Returns `None` when the trigger was skipped.
    pub async fn trigger_cycle(&self) -> Option<CycleSummary> {
        self.inner.trigger_cycle().await
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, CycleState>, SchedulerError> {
        self.inner
            .state
            .lock()
            .map_err(|e| SchedulerError::SchedulingFault(format!("scheduler state poisoned: {}", e)))
    }
}

impl<M: Monitor> Inner<M> {
    async fn timer_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            let cycle = Arc::clone(&self);
            tokio::spawn(async move {
                cycle.trigger_cycle().await;
            });

            tokio::select! {
                biased;
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
                _ = self.clock.sleep(self.config.check_interval) => {}
            }
        }
        debug!(monitor = self.monitor.name(), "cycle timer stopped");
    }

    #[tracing::instrument(skip(self), fields(monitor = %self.monitor.name()))]
    async fn trigger_cycle(&self) -> Option<CycleSummary> {
        let Some(_guard) = CycleGuard::acquire(&self.cycle_in_flight) else {
            debug!("previous cycle still in flight, skipping");
            return None;
        };

        let started = self.clock.now();
        let mut summary = CycleSummary::new(self.monitor.name(), Utc::now());

        match AssertUnwindSafe(self.execute_cycle(&mut summary))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "cycle failed");
                summary.error = Some(e.to_string());
            }
            Err(_) => {
                let fault = SchedulerError::SchedulingFault("cycle panicked".to_string());
                error!(error = %fault, "cycle aborted");
                summary.error = Some(fault.to_string());
            }
        }

        summary.elapsed_ms = self.clock.now().saturating_duration_since(started).as_millis() as u64;
        info!(
            targets = summary.targets,
            successes = summary.successes,
            errors = summary.errors,
            sent = summary.sent,
            already_sent = summary.already_sent,
            send_failed = summary.send_failed,
            elapsed_ms = summary.elapsed_ms,
            throughput_per_sec = summary.throughput(),
            "cycle complete"
        );
        Some(summary)
    }

    async fn execute_cycle(&self, summary: &mut CycleSummary) -> Result<(), SchedulerError> {
        let targets = self.monitor.fetch_targets().await?;
        summary.targets = targets.len();
        info!(targets = targets.len(), "cycle started");

        let outcomes: Mutex<Vec<SideEffectOutcome>> = Mutex::new(Vec::new());
        let progress_log = ProgressLog::new(self.monitor.name(), Arc::clone(&self.clock));
        let on_progress = |progress: &ExecutionProgress| {
            progress_log.observe(progress);
        };

        let monitor = &self.monitor;
        let outcomes_ref = &outcomes;
        let progress = self
            .executor
            .run(
                targets,
                move |target: M::Target| async move {
                    let target_id = monitor.target_id(&target);
                    match monitor.process(target).await {
                        Ok(outcome) => {
                            let failed = matches!(outcome, SideEffectOutcome::SendFailed { .. });
                            if let Ok(mut outcomes) = outcomes_ref.lock() {
                                outcomes.push(outcome);
                            }
                            if failed { Err(()) } else { Ok(()) }
                        }
                        Err(e) => {
                            warn!(
                                monitor = monitor.name(),
                                target = %target_id,
                                error = %e,
                                "target check failed"
                            );
                            Err(())
                        }
                    }
                },
                Some(&on_progress),
            )
            .await;

        summary.apply_progress(&progress);
        let outcomes = outcomes
            .into_inner()
            .map_err(|e| SchedulerError::SchedulingFault(format!("outcome tally poisoned: {}", e)))?;
        for outcome in &outcomes {
            summary.apply_outcome(outcome);
        }
        Ok(())
    }
}
