//! Backoff computation for retry waits.
//!
//! Delays are keyed by the retry ordinal: the wait before attempt `n + 1`
//! uses `delay(n)`, so the first retry uses `delay(1)`. The exponential
//! strategy doubles from its base; with the stock two-second base the
//! sequence is 2^1, 2^2, 2^3, … seconds. Arithmetic saturates at
//! [`MAX_BACKOFF`] instead of overflowing.
//!
//! [`Backoff::compute`] is the context-aware entry point: a server-provided
//! `Retry-After` hint overrides the computed value entirely for that wait.
//! It is a pure function of its inputs, which is what makes the retry loop
//! testable without a clock.
//!
//! ```rust
//! use std::time::Duration;
//! use backstop::{Backoff, RetryContext};
//!
//! let backoff = Backoff::default(); // exponential, 2s base
//! assert_eq!(backoff.delay(1), Duration::from_secs(2));
//! assert_eq!(backoff.delay(2), Duration::from_secs(4));
//! assert_eq!(backoff.delay(3), Duration::from_secs(8));
//!
//! let mut ctx = RetryContext::new();
//! ctx.set_retry_after(Some(Duration::from_secs(10)));
//! assert_eq!(backoff.compute(3, &ctx), Duration::from_secs(10)); // hint wins
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::context::RetryContext;

/// Ceiling applied when a computation would overflow (one hour).
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Errors from backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackoffError {
    #[error("max delay must be greater than zero")]
    ZeroMax,
    #[error("max delay {max:?} is below the base delay {base:?}")]
    MaxBelowBase { base: Duration, max: Duration },
    #[error("constant backoff does not take a max")]
    ConstantMax,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Strategy {
    Constant { delay: Duration },
    Exponential { base: Duration, max: Option<Duration> },
}

/// A backoff strategy: constant for tests and simple cadences, exponential
/// for the standard retrying policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    strategy: Strategy,
}

impl Default for Backoff {
    /// Exponential with a two-second base: 2^n seconds before retry `n + 1`.
    fn default() -> Self {
        Self::exponential(Duration::from_secs(2))
    }
}

impl Backoff {
    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self { strategy: Strategy::Constant { delay } }
    }

    /// Doubling delay: `base * 2^(n-1)` before attempt `n + 1`.
    pub fn exponential(base: Duration) -> Self {
        Self { strategy: Strategy::Exponential { base, max: None } }
    }

    /// Cap the exponential growth. Rejected for constant backoff, a zero
    /// cap, or a cap below the base.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::ZeroMax);
        }
        match &mut self.strategy {
            Strategy::Exponential { base, max: slot } => {
                if max < *base {
                    return Err(BackoffError::MaxBelowBase { base: *base, max });
                }
                *slot = Some(max);
                Ok(self)
            }
            Strategy::Constant { .. } => Err(BackoffError::ConstantMax),
        }
    }

    /// Delay for retry ordinal `attempt` (1-based). Ordinal 0 means "no wait
    /// yet" and returns zero.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match &self.strategy {
            Strategy::Constant { delay } => *delay,
            Strategy::Exponential { base, max } => {
                let multiplier = 2u128.saturating_pow(attempt - 1);
                let nanos = base.as_nanos().saturating_mul(multiplier);
                let delay = Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64);
                let capped = max.map(|m| delay.min(m)).unwrap_or(delay);
                capped.min(MAX_BACKOFF)
            }
        }
    }

    /// Delay for a retry given its context. A `Retry-After` hint in the
    /// context overrides the computed delay entirely; otherwise this is
    /// [`Backoff::delay`]. Pure and deterministic.
    pub fn compute(&self, attempt: u32, ctx: &RetryContext) -> Duration {
        ctx.retry_after().unwrap_or_else(|| self.delay(attempt))
    }
}
