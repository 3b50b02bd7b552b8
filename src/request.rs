//! Request/response model and the transport seam.
//!
//! The dispatch core never talks to the network itself. It hands an
//! [`ApiRequest`] to an injected [`Transport`] and classifies whatever comes
//! back. The production transport lives in [`crate::client`]; tests inject
//! scripted implementations.

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use http::header::HeaderName;
use thiserror::Error;

/// An outgoing API request. Read-only to the retry machinery: the executor
/// may send the same request several times, so nothing in the loop mutates it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Build a request for an arbitrary method and target path.
    ///
    /// The target is resolved against the transport's base URL; it is not a
    /// full URL.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self { method, target: target.into(), headers: HeaderMap::new(), body: None }
    }

    /// GET request for `target`.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// DELETE request for `target`.
    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// POST request for `target` carrying a JSON body.
    pub fn post(target: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, target).with_body(body)
    }

    /// Attach a header, replacing any previous value for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

/// A response from the remote API, reduced to what classification and callers
/// need: status, headers, and the raw body text.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: String) -> Self {
        Self { status, headers, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body text.
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Consume the response, keeping only the body text.
    pub fn into_text(self) -> String {
        self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Failures below the HTTP layer. Every variant is classified as retryable:
/// the request never reached the server, or the connection died before a
/// status arrived, so a repeat cannot observe a duplicated side effect any
/// more than the original could.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection could not be established or was dropped mid-flight.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The attempt's own timeout elapsed (timeouts are configured on the
    /// transport, not imposed by the retry loop).
    #[error("request timed out: {0}")]
    Timeout(String),
    /// No bearer token could be produced for the attempt.
    #[error("bearer token unavailable: {0}")]
    Auth(String),
}

/// The injected send capability. Implementations carry their own auth
/// headers and per-attempt timeouts; the retry core only sees the result.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
