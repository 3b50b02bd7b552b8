//! Retry policies: what happens to a request once the dispatcher picks it up.
//!
//! A [`Policy`] bundles an attempt ceiling, a backoff strategy, and a jitter
//! strategy under one of two kinds: retrying (the full loop) or passthrough
//! (exactly one attempt, every outcome final). Policies are immutable once
//! built and cheap to clone out of the registry.
//!
//! ```rust
//! use std::time::Duration;
//! use backstop::{Backoff, Policy};
//!
//! let policy = Policy::builder()
//!     .max_attempts(3)
//!     .backoff(Backoff::exponential(Duration::from_secs(2)))
//!     .build();
//! assert_eq!(policy.effective_attempts(), 3);
//!
//! let single = Policy::passthrough();
//! assert!(single.single_shot());
//! ```

use std::time::Duration;

use crate::backoff::Backoff;
use crate::context::RetryContext;
use crate::jitter::Jitter;

/// How a policy treats the request it governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Run the retry loop up to the attempt ceiling.
    Retrying,
    /// Execute exactly once; any outcome is final.
    Passthrough,
}

/// An immutable, named-by-the-registry retry policy.
#[derive(Debug, Clone)]
pub struct Policy {
    kind: PolicyKind,
    max_attempts: u32,
    backoff: Backoff,
    jitter: Jitter,
}

impl Policy {
    /// Builder for a retrying policy. Defaults: 3 attempts, exponential
    /// backoff from a two-second base (2^n seconds), no jitter.
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    /// The no-op policy: one attempt, no waits, no notifications.
    pub fn passthrough() -> Self {
        Self {
            kind: PolicyKind::Passthrough,
            max_attempts: 1,
            backoff: Backoff::constant(Duration::ZERO),
            jitter: Jitter::None,
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// True when no retry loop is entered: passthrough policies, and
    /// retrying policies configured with a zero attempt ceiling.
    pub fn single_shot(&self) -> bool {
        matches!(self.kind, PolicyKind::Passthrough) || self.max_attempts == 0
    }

    /// Total attempts the executor will make. Single-shot policies always
    /// run the request once.
    pub fn effective_attempts(&self) -> u32 {
        if self.single_shot() {
            1
        } else {
            self.max_attempts
        }
    }

    /// Wait before the next attempt, given the retry ordinal and context.
    ///
    /// A server hint is honored exactly; jitter only ever shapes computed
    /// backoff.
    pub fn delay_for(&self, attempt: u32, ctx: &RetryContext) -> Duration {
        let computed = self.backoff.compute(attempt, ctx);
        if ctx.retry_after().is_some() {
            computed
        } else {
            self.jitter.apply(computed)
        }
    }
}

/// Builder for retrying policies. `build` is infallible: a zero attempt
/// ceiling is legal and means single-shot execution.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    max_attempts: u32,
    backoff: Backoff,
    jitter: Jitter,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self { max_attempts: 3, backoff: Backoff::default(), jitter: Jitter::None }
    }

    /// Total attempts, initial try included. Zero means execute once with no
    /// retry loop.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn build(self) -> Policy {
        Policy {
            kind: PolicyKind::Retrying,
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            jitter: self.jitter,
        }
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
