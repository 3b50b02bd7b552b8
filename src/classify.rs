//! Outcome classification for a single attempt.
//!
//! One send produces one [`Outcome`]. The rules, checked in priority order:
//!
//! 1. transport-level failure → retryable (`transport`)
//! 2. 5xx → retryable (`server-error`)
//! 3. 429 → retryable (`rate-limited`), carrying any parsable `Retry-After`
//! 4. 408 → retryable (`timeout`)
//! 5. any other non-2xx → terminal, surfaced to the caller as-is
//! 6. 2xx → success
//!
//! A malformed `Retry-After` header never fails classification; it is
//! treated as absent and the wait falls back to computed backoff.

use std::time::Duration;

use http::header::RETRY_AFTER;
use http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::request::{ApiResponse, TransportError};

/// Why a failed attempt is worth repeating. Carried into the exhaustion
/// error so the caller sees the last thing that went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// The request never completed at the HTTP layer.
    #[error("transport: {0}")]
    Transport(String),
    /// The server answered 5xx.
    #[error("server-error: {0}")]
    Server(u16),
    /// The server answered 429.
    #[error("rate-limited")]
    RateLimited,
    /// The server answered 408.
    #[error("timeout")]
    Timeout,
}

/// Result of classifying one attempt.
#[derive(Debug)]
pub enum Outcome {
    /// 2xx: ends the loop with the response.
    Success(ApiResponse),
    /// Worth another attempt, with the server's wait hint if it sent one.
    Retryable { reason: FailureKind, retry_after: Option<Duration> },
    /// Non-retryable status: ends the loop, response surfaced to the caller.
    Terminal(ApiResponse),
}

/// Classify the result of one send.
pub fn classify(result: Result<ApiResponse, TransportError>) -> Outcome {
    let response = match result {
        Err(err) => {
            return Outcome::Retryable {
                reason: FailureKind::Transport(err.to_string()),
                retry_after: None,
            }
        }
        Ok(response) => response,
    };

    let status = response.status();
    if status.is_success() {
        Outcome::Success(response)
    } else if status.is_server_error() {
        Outcome::Retryable { reason: FailureKind::Server(status.as_u16()), retry_after: None }
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = parse_retry_after(response.headers());
        Outcome::Retryable { reason: FailureKind::RateLimited, retry_after }
    } else if status == StatusCode::REQUEST_TIMEOUT {
        Outcome::Retryable { reason: FailureKind::Timeout, retry_after: None }
    } else {
        Outcome::Terminal(response)
    }
}

/// `Retry-After` as a non-negative integer count of seconds. Any other shape
/// (HTTP-date, negative, fractional, non-UTF-8) reads as absent.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}
