//! Retry notifications for logging and metrics.
//!
//! The executor tells an observer about every wait it is about to take.
//! Observers are for visibility only: nothing they do feeds back into
//! control flow, and the trait is infallible by construction so a sink can
//! never break the loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

/// Receives one callback per retry, synchronously, before the wait starts.
///
/// `attempt` is the 1-based retry ordinal: the wait before attempt `n + 1`
/// reports `attempt = n`.
pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, attempt: u32, delay: Duration);
}

impl<T: RetryObserver + ?Sized> RetryObserver for Arc<T> {
    fn on_retry(&self, attempt: u32, delay: Duration) {
        (**self).on_retry(attempt, delay)
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_retry(&self, _attempt: u32, _delay: Duration) {}
}

/// Observer that logs each retry through `tracing`, tagged with an operation
/// name for context.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self { operation: operation.into() }
    }
}

impl RetryObserver for TracingObserver {
    fn on_retry(&self, attempt: u32, delay: Duration) {
        warn!(
            operation = %self.operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, backing off before retry"
        );
    }
}

/// Observer that records every notification. Useful in tests and for metric
/// assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<(u32, Duration)>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything seen so far, in emission order.
    pub fn notifications(&self) -> Vec<(u32, Duration)> {
        self.events.lock().expect("observer state poisoned").clone()
    }
}

impl RetryObserver for RecordingObserver {
    fn on_retry(&self, attempt: u32, delay: Duration) {
        self.events.lock().expect("observer state poisoned").push((attempt, delay));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_emission_order() {
        let observer = RecordingObserver::new();
        observer.on_retry(1, Duration::from_secs(2));
        observer.on_retry(2, Duration::from_secs(4));
        assert_eq!(
            observer.notifications(),
            vec![(1, Duration::from_secs(2)), (2, Duration::from_secs(4))]
        );
    }

    #[test]
    fn arc_wrapped_observers_share_state() {
        let observer = Arc::new(RecordingObserver::new());
        let clone = observer.clone();
        clone.on_retry(1, Duration::ZERO);
        assert_eq!(observer.notifications().len(), 1);
    }

    #[test]
    fn noop_observer_accepts_anything() {
        NoopObserver.on_retry(42, Duration::from_secs(1));
    }
}
