//! The retry loop: attempt, classify, wait, repeat.
//!
//! Semantics:
//! - Attempts are numbered from 1 and never exceed the policy's ceiling.
//! - A success or a terminal status ends the loop immediately.
//! - A retryable failure waits (observer notified first) and goes again,
//!   unless the ceiling is reached, at which point the last failure surfaces as
//!   [`DispatchError::Exhausted`].
//! - Single-shot policies (passthrough, or a zero ceiling) never enter the
//!   loop; their one failure surfaces as [`DispatchError::Failed`].
//! - Waits suspend cooperatively on the injected [`Sleeper`] and race the
//!   cancellation token; cancellation wins ties and yields
//!   [`DispatchError::Cancelled`] without another send.
//!
//! Each outcome's `Retry-After` hint is written into the [`RetryContext`]
//! before the wait is computed, replacing whatever the previous attempt left
//! there. Hints are attempt-local by design: an unused hint never leaks into
//! a later wait.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::classify::{classify, Outcome};
use crate::context::RetryContext;
use crate::error::DispatchError;
use crate::observer::{NoopObserver, RetryObserver};
use crate::policy::Policy;
use crate::request::{ApiRequest, ApiResponse, Transport};
use crate::sleeper::{Sleeper, TokioSleeper};

/// Drives one logical request through a policy's attempt loop.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: Policy,
    observer: Arc<dyn RetryObserver>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("observer", &"<observer>")
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            observer: Arc::new(NoopObserver),
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Execute `request` against `transport` under this executor's policy.
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        request: &ApiRequest,
    ) -> Result<ApiResponse, DispatchError> {
        let attempts = self.policy.effective_attempts();
        let mut ctx = RetryContext::new();

        for attempt in 1..=attempts {
            debug!(
                attempt,
                total = attempts,
                method = %request.method(),
                target = request.target(),
                "sending attempt"
            );

            match classify(transport.send(request).await) {
                Outcome::Success(response) => return Ok(response),
                Outcome::Terminal(response) => {
                    return Err(DispatchError::Status {
                        status: response.status(),
                        body: response.into_text(),
                    })
                }
                Outcome::Retryable { reason, retry_after } => {
                    if self.policy.single_shot() {
                        return Err(DispatchError::Failed { reason });
                    }
                    if attempt >= attempts {
                        return Err(DispatchError::Exhausted { attempts, last: reason });
                    }

                    // This outcome's hint (or its absence) replaces whatever
                    // the previous attempt left behind.
                    ctx.set_retry_after(retry_after);
                    let delay = self.policy.delay_for(attempt, &ctx);
                    self.observer.on_retry(attempt, delay);

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(DispatchError::Cancelled),
                        _ = self.sleeper.sleep(delay) => {}
                    }
                }
            }
        }

        // Every loop iteration returns or waits-then-continues, and the last
        // iteration always returns.
        debug_assert!(false, "retry loop exited without a terminal outcome");
        unreachable!()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FailureKind;
    use crate::observer::RecordingObserver;
    use crate::request::TransportError;
    use crate::sleeper::{InstantSleeper, TrackingSleeper};
    use async_trait::async_trait;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    enum Step {
        Status(u16),
        RateLimited(&'static str),
        Broken,
    }

    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        sends: AtomicUsize,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Self {
            Self { steps: Mutex::new(steps.into()), sends: AtomicUsize::new(0) }
        }

        fn sends(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more times than scripted");
            match step {
                Step::Status(code) => Ok(ApiResponse::new(
                    StatusCode::from_u16(code).unwrap(),
                    HeaderMap::new(),
                    String::new(),
                )),
                Step::RateLimited(header) => {
                    let mut headers = HeaderMap::new();
                    headers
                        .insert(http::header::RETRY_AFTER, HeaderValue::from_static(header));
                    Ok(ApiResponse::new(StatusCode::TOO_MANY_REQUESTS, headers, String::new()))
                }
                Step::Broken => Err(TransportError::Connect("connection refused".into())),
            }
        }
    }

    fn executor(policy: Policy) -> RetryExecutor {
        RetryExecutor::new(policy).with_sleeper(Arc::new(InstantSleeper))
    }

    #[tokio::test]
    async fn first_attempt_success_sends_once() {
        let transport = Scripted::new(vec![Step::Status(200)]);
        let result =
            executor(Policy::builder().build()).execute(&transport, &ApiRequest::get("WhoAmI")).await;
        assert!(result.is_ok());
        assert_eq!(transport.sends(), 1);
    }

    #[tokio::test]
    async fn recovers_after_transport_failure() {
        let transport = Scripted::new(vec![Step::Broken, Step::Status(200)]);
        let observer = Arc::new(RecordingObserver::new());
        let result = executor(Policy::builder().build())
            .with_observer(observer.clone())
            .execute(&transport, &ApiRequest::get("WhoAmI"))
            .await;
        assert!(result.is_ok());
        assert_eq!(transport.sends(), 2);
        assert_eq!(observer.notifications().len(), 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_the_last_failure() {
        let transport = Scripted::new(vec![Step::Status(503), Step::Status(503), Step::Broken]);
        let err = executor(Policy::builder().max_attempts(3).build())
            .execute(&transport, &ApiRequest::get("WhoAmI"))
            .await
            .unwrap_err();
        assert_eq!(transport.sends(), 3);
        match err {
            DispatchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, FailureKind::Transport(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_status_carries_the_body() {
        struct Denied;
        #[async_trait]
        impl Transport for Denied {
            async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, TransportError> {
                Ok(ApiResponse::new(
                    StatusCode::FORBIDDEN,
                    HeaderMap::new(),
                    r#"{"error":{"code":"Authorization_RequestDenied"}}"#.to_string(),
                ))
            }
        }
        let err = executor(Policy::builder().build())
            .execute(&Denied, &ApiRequest::get("WhoAmI"))
            .await
            .unwrap_err();
        match err {
            DispatchError::Status { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(body.contains("Authorization_RequestDenied"));
            }
            other => panic!("expected terminal status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn passthrough_failure_is_not_an_exhaustion() {
        let transport = Scripted::new(vec![Step::Status(503)]);
        let observer = Arc::new(RecordingObserver::new());
        let err = executor(Policy::passthrough())
            .with_observer(observer.clone())
            .execute(&transport, &ApiRequest::post("accounts", serde_json::json!({})))
            .await
            .unwrap_err();
        assert_eq!(transport.sends(), 1);
        assert!(observer.notifications().is_empty());
        assert!(matches!(err, DispatchError::Failed { reason: FailureKind::Server(503) }));
    }

    #[tokio::test]
    async fn zero_attempt_ceiling_behaves_like_passthrough() {
        let transport = Scripted::new(vec![Step::Status(500)]);
        let err = executor(Policy::builder().max_attempts(0).build())
            .execute(&transport, &ApiRequest::get("WhoAmI"))
            .await
            .unwrap_err();
        assert_eq!(transport.sends(), 1);
        assert!(matches!(err, DispatchError::Failed { .. }));
    }

    #[tokio::test]
    async fn rate_limit_hint_sets_the_exact_wait() {
        let transport = Scripted::new(vec![Step::RateLimited("10"), Step::Status(200)]);
        let sleeper = Arc::new(TrackingSleeper::new());
        let result = RetryExecutor::new(Policy::builder().build())
            .with_sleeper(sleeper.clone())
            .execute(&transport, &ApiRequest::get("WhoAmI"))
            .await;
        assert!(result.is_ok());
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn unused_hint_does_not_leak_into_the_next_wait() {
        // Attempt 1: 429 with a 7s hint (used). Attempt 2: plain 503. The
        // wait must fall back to the exponential value for ordinal 2, not
        // reuse the stale hint.
        let transport = Scripted::new(vec![
            Step::RateLimited("7"),
            Step::Status(503),
            Step::Status(200),
        ]);
        let sleeper = Arc::new(TrackingSleeper::new());
        let result = RetryExecutor::new(Policy::builder().build())
            .with_sleeper(sleeper.clone())
            .execute(&transport, &ApiRequest::get("WhoAmI"))
            .await;
        assert!(result.is_ok());
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(7), Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn malformed_hint_falls_back_to_backoff() {
        let transport = Scripted::new(vec![Step::RateLimited("soon"), Step::Status(200)]);
        let sleeper = Arc::new(TrackingSleeper::new());
        let result = RetryExecutor::new(Policy::builder().build())
            .with_sleeper(sleeper.clone())
            .execute(&transport, &ApiRequest::get("WhoAmI"))
            .await;
        assert!(result.is_ok());
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn pre_cancelled_token_stops_before_the_second_attempt() {
        let transport = Scripted::new(vec![Step::Status(503), Step::Status(200)]);
        let token = CancellationToken::new();
        token.cancel();
        let err = executor(Policy::builder().build())
            .with_cancellation(token)
            .execute(&transport, &ApiRequest::get("WhoAmI"))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(transport.sends(), 1);
    }
}
