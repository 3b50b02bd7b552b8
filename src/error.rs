//! Terminal outcomes surfaced to callers.
//!
//! Retryable classifications never escape the executor; a caller only ever
//! sees one of these. Registry errors are startup concerns and live in
//! [`crate::registry`]; they appear here only through the defensive
//! [`DispatchError::Policy`] variant.

use http::StatusCode;
use thiserror::Error;

use crate::classify::FailureKind;
use crate::registry::RegistryError;

/// Everything a dispatched request can terminally fail with.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The server answered with a status outside both 2xx and the retryable
    /// set. Surfaced immediately, body attached for diagnosis.
    #[error("request rejected with status {status}")]
    Status { status: StatusCode, body: String },

    /// A single-shot policy's one attempt failed with a retryable-class
    /// failure. No retry loop was entered, so this is not an exhaustion.
    #[error("request failed: {reason}")]
    Failed { reason: FailureKind },

    /// The retry loop ran out of attempts; the last observed failure rides
    /// along.
    #[error("retries exhausted after {attempts} attempts; last failure: {last}")]
    Exhausted { attempts: u32, last: FailureKind },

    /// Cancelled while waiting between attempts.
    #[error("dispatch cancelled")]
    Cancelled,

    /// Policy lookup failed at dispatch time. Unreachable once the
    /// dispatcher has validated its keys at startup; kept so a registry
    /// mutated behind its back fails loudly instead of panicking.
    #[error("policy lookup failed: {0}")]
    Policy(#[from] RegistryError),
}

impl DispatchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// The terminal HTTP status, when the server produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The last retryable failure, for exhaustion and single-shot failures.
    pub fn last_failure(&self) -> Option<&FailureKind> {
        match self {
            Self::Failed { reason } => Some(reason),
            Self::Exhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}
