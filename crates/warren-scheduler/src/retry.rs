//! Resilient invocation of outbound operations.
//!
//! Every attempt races the operation against a per-attempt deadline. Failures are
//! turned into a [`ClassifiedError`] by the classifier family named in the
//! [`RetryPolicy`], and only timeouts and server-side failures are retried, with
//! exponential backoff between attempts.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::SchedulerError;
use crate::clock::Clock;

/// HTTP status used by most services to signal rate limiting.
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Payment-provider error types that indicate a transient provider-side fault.
const PAYMENT_RETRYABLE_TYPES: &[&str] = &["api_error", "rate_limit_error"];

/// Payment-provider error codes that indicate contention or throttling.
const PAYMENT_RETRYABLE_CODES: &[&str] = &["rate_limit", "lock_timeout"];

/// Which classifier family interprets a raw failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Plain HTTP services: reads [`FailureCause::status`].
    #[default]
    Generic,
    /// Payment provider: reads [`FailureCause::provider_error`].
    Payment,
    /// Third-party integration SDKs: reads [`FailureCause::response_status`].
    Integration,
}

impl ErrorClass {
    /// Classify a raw failure with this family's classifier.
    pub fn classify(self, cause: &dyn FailureCause) -> ClassifiedError {
        match self {
            ErrorClass::Generic => classify_generic(cause),
            ErrorClass::Payment => classify_payment(cause),
            ErrorClass::Integration => classify_integration(cause),
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Generic => write!(f, "generic"),
            ErrorClass::Payment => write!(f, "payment"),
            ErrorClass::Integration => write!(f, "integration"),
        }
    }
}

impl FromStr for ErrorClass {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" => Ok(ErrorClass::Generic),
            "payment" => Ok(ErrorClass::Payment),
            "integration" => Ok(ErrorClass::Integration),
            other => Err(SchedulerError::InvalidConfig(format!(
                "unknown error class '{}', expected generic/payment/integration",
                other
            ))),
        }
    }
}

/// Retry behavior for a single call. Immutable per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Delay before the first retry; doubles for every following retry.
    pub base_delay: Duration,
    /// Deadline applied to each attempt individually.
    pub per_attempt_timeout: Duration,
    /// Classifier family for raw failures.
    pub error_class: ErrorClass,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            per_attempt_timeout: Duration::from_secs(10),
            error_class: ErrorClass::Generic,
        }
    }
}

impl RetryPolicy {
    /// Create a policy, rejecting a zero per-attempt timeout.
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        per_attempt_timeout: Duration,
        error_class: ErrorClass,
    ) -> Result<Self, SchedulerError> {
        if per_attempt_timeout.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "per-attempt timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_retries,
            base_delay,
            per_attempt_timeout,
            error_class,
        })
    }

    /// Same policy with a different classifier family.
    pub fn with_error_class(mut self, error_class: ErrorClass) -> Self {
        self.error_class = error_class;
        self
    }

    /// Delay before retry number `retry` (0 for the first retry): `base_delay * 2^retry`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Error object reported by a payment provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderError {
    /// Provider error type, e.g. `card_error` or `rate_limit_error`.
    pub kind: Option<String>,
    /// Provider error code, e.g. `lock_timeout`.
    pub code: Option<String>,
    /// HTTP status the provider answered with.
    pub status_code: Option<u16>,
}

/// Raw failure of an outbound operation.
///
/// Each accessor is read by exactly one classifier family. Implementors fill in
/// the fields their transport actually knows about.
pub trait FailureCause: fmt::Display {
    /// HTTP status of the failed response.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Payment provider error object.
    fn provider_error(&self) -> Option<ProviderError> {
        None
    }

    /// Status of the upstream response wrapped by an integration SDK error.
    fn response_status(&self) -> Option<u16> {
        None
    }
}

/// Retry-relevant category of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifiedError {
    /// The attempt did not settle before its deadline.
    #[error("attempt timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// Server-side (5xx) or rate-limit failure.
    #[error("retryable server error{}: {message}", fmt_status(*status))]
    RetryableServerError { status: Option<u16>, message: String },

    /// Client-side failure, or a failure with no recognizable status.
    #[error("non-retryable client error{}: {message}", fmt_status(*status))]
    NonRetryableClientError { status: Option<u16>, message: String },

    /// Failure that never reached a classifier, such as an attempt that panicked.
    #[error("unknown failure: {message}")]
    Unknown { message: String },
}

fn fmt_status(status: Option<u16>) -> String {
    match status {
        Some(status) => format!(" (status {})", status),
        None => String::new(),
    }
}

impl ClassifiedError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifiedError::Timeout { .. } | ClassifiedError::RetryableServerError { .. }
        )
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedError::Timeout { .. } => "timeout",
            ClassifiedError::RetryableServerError { .. } => "retryable_server_error",
            ClassifiedError::NonRetryableClientError { .. } => "non_retryable_client_error",
            ClassifiedError::Unknown { .. } => "unknown",
        }
    }
}

fn classify_status(status: Option<u16>, message: String) -> ClassifiedError {
    match status {
        Some(s) if s >= 500 || s == STATUS_TOO_MANY_REQUESTS => {
            ClassifiedError::RetryableServerError { status, message }
        }
        _ => ClassifiedError::NonRetryableClientError { status, message },
    }
}

/// Classifier for plain HTTP services.
pub fn classify_generic(cause: &dyn FailureCause) -> ClassifiedError {
    classify_status(cause.status(), cause.to_string())
}

/// Classifier for payment-provider failures.
///
/// Besides the HTTP status, the provider's error type and code can mark a
/// failure as transient.
pub fn classify_payment(cause: &dyn FailureCause) -> ClassifiedError {
    let message = cause.to_string();
    let Some(provider) = cause.provider_error() else {
        return ClassifiedError::NonRetryableClientError {
            status: None,
            message,
        };
    };

    let transient_kind = provider
        .kind
        .as_deref()
        .is_some_and(|k| PAYMENT_RETRYABLE_TYPES.contains(&k));
    let transient_code = provider
        .code
        .as_deref()
        .is_some_and(|c| PAYMENT_RETRYABLE_CODES.contains(&c));

    if transient_kind || transient_code {
        return ClassifiedError::RetryableServerError {
            status: provider.status_code,
            message,
        };
    }
    classify_status(provider.status_code, message)
}

/// Classifier for third-party integration SDK failures.
pub fn classify_integration(cause: &dyn FailureCause) -> ClassifiedError {
    classify_status(cause.response_status(), cause.to_string())
}

/// Cancellation signal handed to cancellation-aware operations.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Whether the invoker has requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once cancellation is requested. Never completes if the attempt
    /// finishes without being cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Classify the outcome of one attempt. A panic is never retried.
fn settle<T, E: FailureCause>(
    result: std::thread::Result<Result<T, E>>,
    error_class: ErrorClass,
) -> Result<T, ClassifiedError> {
    match result {
        Ok(result) => result.map_err(|e| error_class.classify(&e)),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "operation panicked".to_string());
            Err(ClassifiedError::Unknown { message })
        }
    }
}

/// Wraps outbound operations with deadlines and classified retries.
#[derive(Clone)]
pub struct ResilientInvoker {
    clock: Arc<dyn Clock>,
}

impl ResilientInvoker {
    /// Create an invoker that waits on the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Run `operation` under `policy`.
    ///
    /// An attempt still pending at its deadline is dropped and counts as a
    /// [`ClassifiedError::Timeout`].
    pub async fn invoke<T, E, F, Fut>(
        &self,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureCause,
    {
        let policy = *policy;
        self.retry_loop(&policy, |_| {
            let attempt = operation();
            let deadline = self.clock.sleep(policy.per_attempt_timeout);
            async move {
                tokio::select! {
                    biased;
                    result = AssertUnwindSafe(attempt).catch_unwind() => settle(result, policy.error_class),
                    _ = deadline => Err(ClassifiedError::Timeout {
                        after: policy.per_attempt_timeout,
                    }),
                }
            }
        })
        .await
    }

    /// Run `operation` under `policy`, passing it a [`CancelSignal`] that fires
    /// when the attempt's deadline elapses.
    ///
    /// Classification and retry behavior are identical to [`Self::invoke`].
    pub async fn invoke_cancellable<T, E, F, Fut>(
        &self,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T, ClassifiedError>
    where
        F: FnMut(CancelSignal) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureCause,
    {
        let policy = *policy;
        self.retry_loop(&policy, |_| {
            let (cancel_tx, signal) = CancelSignal::new();
            let attempt = operation(signal);
            let deadline = self.clock.sleep(policy.per_attempt_timeout);
            async move {
                tokio::select! {
                    biased;
                    result = AssertUnwindSafe(attempt).catch_unwind() => settle(result, policy.error_class),
                    _ = deadline => {
                        let _ = cancel_tx.send(true);
                        Err(ClassifiedError::Timeout {
                            after: policy.per_attempt_timeout,
                        })
                    }
                }
            }
        })
        .await
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(error_class = %policy.error_class, max_retries = policy.max_retries)
    )]
    async fn retry_loop<T, A, AF>(
        &self,
        policy: &RetryPolicy,
        mut attempt_fn: A,
    ) -> Result<T, ClassifiedError>
    where
        A: FnMut(u32) -> AF,
        AF: Future<Output = Result<T, ClassifiedError>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match attempt_fn(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!(
                    attempt,
                    classification = err.kind(),
                    error_class = %policy.error_class,
                    error = %err,
                    "operation failed, not retrying"
                );
                return Err(err);
            }

            if attempt >= policy.max_retries {
                error!(
                    attempt,
                    attempts = attempt + 1,
                    classification = err.kind(),
                    error_class = %policy.error_class,
                    error = %err,
                    "operation failed, retries exhausted"
                );
                return Err(err);
            }

            let delay = policy.backoff_delay(attempt);
            warn!(
                attempt,
                classification = err.kind(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "operation failed, retrying"
            );
            self.clock.sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::clock::testing::RecordingClock;

    const TIMEOUT: Duration = Duration::from_secs(10);
    const BASE: Duration = Duration::from_millis(100);

    #[derive(Debug, Default, Clone)]
    struct TestFailure {
        status: Option<u16>,
        provider: Option<ProviderError>,
        response_status: Option<u16>,
    }

    impl TestFailure {
        fn status(status: u16) -> Self {
            Self {
                status: Some(status),
                ..Default::default()
            }
        }
    }

    impl fmt::Display for TestFailure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test failure")
        }
    }

    impl FailureCause for TestFailure {
        fn status(&self) -> Option<u16> {
            self.status
        }

        fn provider_error(&self) -> Option<ProviderError> {
            self.provider.clone()
        }

        fn response_status(&self) -> Option<u16> {
            self.response_status
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, BASE, TIMEOUT, ErrorClass::Generic).unwrap()
    }

    fn backoff_sleeps(clock: &RecordingClock) -> Vec<Duration> {
        clock.sleeps().into_iter().filter(|d| *d != TIMEOUT).collect()
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = policy(5);
        assert_eq!(policy.backoff_delay(0), BASE);
        assert_eq!(policy.backoff_delay(1), BASE * 2);
        assert_eq!(policy.backoff_delay(2), BASE * 4);
        assert_eq!(policy.backoff_delay(40), Duration::from_millis(100).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = RetryPolicy::new(1, BASE, Duration::ZERO, ErrorClass::Generic);
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    }

    #[test]
    fn test_error_class_from_str() {
        assert_eq!("Payment".parse::<ErrorClass>().unwrap(), ErrorClass::Payment);
        assert_eq!("generic".parse::<ErrorClass>().unwrap(), ErrorClass::Generic);
        assert!("smtp".parse::<ErrorClass>().is_err());
    }

    #[test]
    fn test_generic_classifier() {
        assert!(classify_generic(&TestFailure::status(503)).is_retryable());
        assert!(classify_generic(&TestFailure::status(429)).is_retryable());
        assert!(!classify_generic(&TestFailure::status(404)).is_retryable());
        assert!(matches!(
            classify_generic(&TestFailure::default()),
            ClassifiedError::NonRetryableClientError { status: None, .. }
        ));
    }

    #[test]
    fn test_payment_classifier() {
        let rate_limited = TestFailure {
            provider: Some(ProviderError {
                kind: Some("rate_limit_error".to_string()),
                status_code: Some(400),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(classify_payment(&rate_limited).is_retryable());

        let lock = TestFailure {
            provider: Some(ProviderError {
                code: Some("lock_timeout".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(classify_payment(&lock).is_retryable());

        let card = TestFailure {
            provider: Some(ProviderError {
                kind: Some("card_error".to_string()),
                code: Some("card_declined".to_string()),
                status_code: Some(402),
            }),
            ..Default::default()
        };
        assert!(!classify_payment(&card).is_retryable());

        let server = TestFailure {
            provider: Some(ProviderError {
                status_code: Some(502),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(classify_payment(&server).is_retryable());

        // The generic status field is not consulted by the payment family
        assert!(!classify_payment(&TestFailure::status(503)).is_retryable());
    }

    #[test]
    fn test_integration_classifier() {
        let upstream = TestFailure {
            response_status: Some(502),
            ..Default::default()
        };
        assert!(classify_integration(&upstream).is_retryable());
        assert!(!classify_integration(&TestFailure::status(500)).is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_single_attempt() {
        let clock = Arc::new(RecordingClock::default());
        let invoker = ResilientInvoker::new(clock.clone());
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = invoker
            .invoke(&policy(3), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestFailure::status(404)) }
            })
            .await;

        assert!(matches!(
            result,
            Err(ClassifiedError::NonRetryableClientError {
                status: Some(404),
                ..
            })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(backoff_sleeps(&clock).is_empty());
    }

    async fn explode(message: &str) -> Result<(), TestFailure> {
        panic!("{}", message)
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_operation_is_unknown_without_retry() {
        let clock = Arc::new(RecordingClock::default());
        let invoker = ResilientInvoker::new(clock.clone());
        let attempts = AtomicU32::new(0);

        let result: Result<(), ClassifiedError> = invoker
            .invoke(&policy(3), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                explode("broker client blew up")
            })
            .await;

        assert_eq!(
            result,
            Err(ClassifiedError::Unknown {
                message: "broker client blew up".to_string()
            })
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(backoff_sleeps(&clock).is_empty());

        let attempts = AtomicU32::new(0);
        let result: Result<(), ClassifiedError> = invoker
            .invoke_cancellable(&policy(3), |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                explode("attempt 1")
            })
            .await;
        assert_eq!(
            result,
            Err(ClassifiedError::Unknown {
                message: "attempt 1".to_string()
            })
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_exhausts_with_exponential_backoff() {
        let clock = Arc::new(RecordingClock::default());
        let invoker = ResilientInvoker::new(clock.clone());
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = invoker
            .invoke(&policy(3), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestFailure::status(503)) }
            })
            .await;

        assert!(matches!(
            result,
            Err(ClassifiedError::RetryableServerError {
                status: Some(503),
                ..
            })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(backoff_sleeps(&clock), vec![BASE, BASE * 2, BASE * 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let clock = Arc::new(RecordingClock::default());
        let invoker = ResilientInvoker::new(clock.clone());
        let attempts = AtomicU32::new(0);

        let result = invoker
            .invoke(&policy(3), || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestFailure::status(500))
                    } else {
                        Ok("healthy")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("healthy"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(backoff_sleeps(&clock), vec![BASE, BASE * 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retries_regardless_of_error_class() {
        for class in [ErrorClass::Generic, ErrorClass::Payment, ErrorClass::Integration] {
            let invoker = ResilientInvoker::new(Arc::new(RecordingClock::default()));
            let attempts = AtomicU32::new(0);

            let result: Result<(), ClassifiedError> = invoker
                .invoke(&policy(2).with_error_class(class), || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    std::future::pending::<Result<(), TestFailure>>()
                })
                .await;

            assert_eq!(result, Err(ClassifiedError::Timeout { after: TIMEOUT }));
            assert_eq!(attempts.load(Ordering::SeqCst), 3, "class {}", class);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_one_attempt() {
        let invoker = ResilientInvoker::new(Arc::new(RecordingClock::default()));
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = invoker
            .invoke(&policy(0), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestFailure::status(500)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_signals_on_deadline() {
        let invoker = ResilientInvoker::new(Arc::new(RecordingClock::default()));
        let signals = Mutex::new(Vec::new());

        let result: Result<(), ClassifiedError> = invoker
            .invoke_cancellable(&policy(1), |signal| {
                signals.lock().unwrap().push(signal.clone());
                async move {
                    signal.cancelled().await;
                    Err(TestFailure::status(499))
                }
            })
            .await;

        assert_eq!(result, Err(ClassifiedError::Timeout { after: TIMEOUT }));
        let signals = signals.into_inner().unwrap();
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().all(CancelSignal::is_cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_matches_race_semantics() {
        let clock = Arc::new(RecordingClock::default());
        let invoker = ResilientInvoker::new(clock.clone());
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = invoker
            .invoke_cancellable(&policy(3), |signal| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert!(!signal.is_cancelled());
                    Err(TestFailure::status(503))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(ClassifiedError::RetryableServerError { .. })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(backoff_sleeps(&clock), vec![BASE, BASE * 2, BASE * 4]);

        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = invoker
            .invoke_cancellable(&policy(3), |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestFailure::status(401)) }
            })
            .await;
        assert!(matches!(
            result,
            Err(ClassifiedError::NonRetryableClientError { .. })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
