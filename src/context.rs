//! Per-request retry context.

use std::time::Duration;

/// Mutable state threaded through one logical request's retry loop and
/// discarded when the loop ends.
///
/// The only entry today is the server-provided `Retry-After` hint. Hints are
/// attempt-local: each retryable outcome replaces the hint (or clears it, if
/// the new outcome carried none) before the next wait is computed, so a stale
/// hint from two attempts ago never shapes a later delay.
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    retry_after: Option<Duration>,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the hint observed on the latest attempt. Passing `None` clears
    /// any previous hint.
    pub fn set_retry_after(&mut self, hint: Option<Duration>) {
        self.retry_after = hint;
    }

    /// The wait the server asked for, if the latest attempt carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_without_a_hint() {
        assert_eq!(RetryContext::new().retry_after(), None);
    }

    #[test]
    fn later_outcomes_replace_or_clear_the_hint() {
        let mut ctx = RetryContext::new();
        ctx.set_retry_after(Some(Duration::from_secs(10)));
        assert_eq!(ctx.retry_after(), Some(Duration::from_secs(10)));

        ctx.set_retry_after(Some(Duration::from_secs(3)));
        assert_eq!(ctx.retry_after(), Some(Duration::from_secs(3)));

        ctx.set_retry_after(None);
        assert_eq!(ctx.retry_after(), None);
    }
}
