//! Method-aware policy selection and request routing.
//!
//! GET and DELETE are idempotent against the remote API and safe to retry;
//! every other method may duplicate side effects on a blind retry and runs
//! single-shot. The rule is fixed per method, not configurable per call; it
//! is the safety contract of the whole crate, and it is deterministic: one
//! policy per request, always the same one for the same method.

use std::sync::Arc;

use http::Method;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::executor::RetryExecutor;
use crate::observer::{NoopObserver, RetryObserver};
use crate::registry::{keys, PolicyRegistry, RegistryError};
use crate::request::{ApiRequest, ApiResponse, Transport};
use crate::sleeper::{Sleeper, TokioSleeper};

/// Routes each request through the policy its method calls for.
pub struct Dispatcher {
    registry: Arc<PolicyRegistry>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn RetryObserver>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("transport", &"<transport>")
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl Dispatcher {
    /// Build a dispatcher over `registry` and `transport`.
    ///
    /// Both well-known keys are resolved up front, so a missing policy is a
    /// startup error here rather than a surprise mid-request.
    pub fn new(
        registry: Arc<PolicyRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RegistryError> {
        registry.validate(&[keys::RETRYING, keys::PASSTHROUGH])?;
        Ok(Self {
            registry,
            transport,
            observer: Arc::new(NoopObserver),
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Use an externally owned cancellation token; cancelling it aborts any
    /// pending backoff wait across every in-flight dispatch.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle to this dispatcher's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The fixed method → policy-key mapping.
    pub fn policy_key_for(method: &Method) -> &'static str {
        if *method == Method::GET || *method == Method::DELETE {
            keys::RETRYING
        } else {
            keys::PASSTHROUGH
        }
    }

    /// Execute `request` under the policy its method selects. Only terminal
    /// outcomes come back; intermediate retryable failures stay inside the
    /// executor.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, DispatchError> {
        let key = Self::policy_key_for(request.method());
        let policy = self.registry.resolve(key)?;
        let executor = RetryExecutor::new(policy)
            .with_observer(self.observer.clone())
            .with_sleeper(self.sleeper.clone())
            .with_cancellation(self.cancel.clone());
        executor.execute(self.transport.as_ref(), &request).await
    }
}
