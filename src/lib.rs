#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Backstop
//!
//! Policy-driven retry dispatch for HTTP request execution.
//!
//! A [`Dispatcher`] routes each outgoing request through a retry policy
//! chosen by its HTTP method: GET and DELETE are idempotent and get the
//! bounded wait-and-retry policy; every other method runs single-shot so a
//! blind retry can never duplicate a side effect downstream. Each attempt's
//! result is classified as success, retryable failure, or terminal, and
//! retryable failures wait out a bounded exponential backoff that a
//! server-provided `Retry-After` hint overrides exactly.
//!
//! ## Features
//!
//! - **Method-aware dispatch** over a validated, named policy registry
//! - **Outcome classification** covering transport failures, 5xx, 429
//!   (with `Retry-After`), 408, and terminal statuses
//! - **Bounded exponential backoff** with optional caps and jitter
//! - **Cancellation-aware waits** that never block concurrent request flows
//! - **Observer hooks** for logging and metrics, outside the control path
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use backstop::{
//!     ApiRequest, ApiResponse, Dispatcher, Policy, PolicyRegistry, Transport, TransportError,
//! };
//!
//! struct AlwaysOk;
//!
//! #[async_trait]
//! impl Transport for AlwaysOk {
//!     async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, TransportError> {
//!         Ok(ApiResponse::new(http::StatusCode::OK, http::HeaderMap::new(), "{}".into()))
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = Arc::new(PolicyRegistry::with_standard_policies(
//!     Policy::builder().max_attempts(3).build(),
//! ));
//! let dispatcher = Dispatcher::new(registry, Arc::new(AlwaysOk)).unwrap();
//! let response = dispatcher.dispatch(ApiRequest::get("WhoAmI")).await.unwrap();
//! assert!(response.status().is_success());
//! # });
//! ```

pub mod auth;
pub mod backoff;
pub mod classify;
pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod jitter;
pub mod observer;
pub mod policy;
pub mod registry;
pub mod request;
pub mod sleeper;

// Re-exports
pub use backoff::{Backoff, BackoffError, MAX_BACKOFF};
pub use classify::{classify, FailureKind, Outcome};
pub use context::RetryContext;
pub use dispatch::Dispatcher;
pub use error::DispatchError;
pub use executor::RetryExecutor;
pub use jitter::Jitter;
pub use observer::{NoopObserver, RecordingObserver, RetryObserver, TracingObserver};
pub use policy::{Policy, PolicyBuilder, PolicyKind};
pub use registry::{keys, PolicyRegistry, RegistryError};
pub use request::{ApiRequest, ApiResponse, Transport, TransportError};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
