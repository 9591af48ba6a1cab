//! Clock and timer abstraction.
//!
//! Every wait in the orchestration core (backoff delays, per-attempt deadlines,
//! the recurring cycle timer, dispatch retries) goes through a [`Clock`] so tests
//! can substitute virtual time.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Instant;

/// Boxed sleep future returned by [`Clock::sleep`].
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Source of time and timers.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// A future that completes once `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// Clock backed by the tokio timer.
///
/// Honors `tokio::time::pause`, so `#[tokio::test(start_paused = true)]`
/// gives deterministic virtual time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Tokio-backed clock that also records every requested sleep.
    #[derive(Debug, Default)]
    pub struct RecordingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingClock {
        pub fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    impl Clock for RecordingClock {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, duration: Duration) -> Sleep {
            self.sleeps.lock().unwrap().push(duration);
            Box::pin(tokio::time::sleep(duration))
        }
    }
}
