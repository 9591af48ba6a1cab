//! Background job orchestration for Warren.
//!
//! This crate provides the core shared by every Warren monitor:
//! - A resilient invoker with per-attempt deadlines and classified retries
//! - A bounded-concurrency executor that keeps a sliding window of work in flight
//! - A cycle scheduler that never overlaps cycles and starts/stops idempotently
//! - Idempotent side effects backed by a marker ledger

pub mod clock;
mod error;
mod executor;
mod retry;
mod scheduler;
mod side_effect;
mod types;

pub use clock::{Clock, TokioClock};
pub use error::{ItemError, SchedulerError};
pub use executor::{
    BoundedExecutor, DISPATCH_RETRY_DELAY, ExecutionProgress, ItemOutcome, MAX_DISPATCH_ATTEMPTS,
    ProgressCallback, ProgressLog,
};
pub use retry::{
    CancelSignal, ClassifiedError, ErrorClass, FailureCause, ProviderError, ResilientInvoker,
    RetryPolicy, classify_generic, classify_integration, classify_payment,
};
pub use scheduler::{CycleScheduler, Monitor};
pub use side_effect::{
    MemoryLedger, Notification, Notifier, SendReport, SideEffectKey, SideEffectLedger,
    SideEffectOutcome, dispatch_once,
};
pub use types::{CycleSummary, SchedulerConfig};
