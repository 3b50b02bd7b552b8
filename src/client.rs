//! `reqwest`-backed transport with bearer auth and default headers.
//!
//! This is the host side of the [`Transport`] seam: it resolves targets
//! against a base URL, stamps default headers and a fresh bearer token onto
//! every attempt, and maps `reqwest` failures into [`TransportError`] so the
//! classifier treats them as retryable. Per-attempt timeouts live here, on
//! the underlying client; the retry loop never imposes its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use thiserror::Error;
use url::Url;

use crate::auth::TokenProvider;
use crate::request::{ApiRequest, ApiResponse, Transport, TransportError};

/// Errors from client construction.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL '{url}': {source}")]
    BaseUrl { url: String, source: url::ParseError },
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Authenticated REST transport for one remote API.
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    default_headers: HeaderMap,
    tokens: Arc<dyn TokenProvider>,
}

impl RestClient {
    /// Build a client for `base_url`. A trailing slash matters: request
    /// targets are joined RFC 3986-style, so `…/api/data/v9.1/` + `WhoAmI`
    /// resolves under the API root.
    pub fn new(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        default_headers: HeaderMap,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)
            .map_err(|source| ClientError::BaseUrl { url: base_url.to_string(), source })?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base, default_headers, tokens })
    }

    fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        self.base
            .join(target)
            .map_err(|e| TransportError::Connect(format!("invalid request target '{target}': {e}")))
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|e| TransportError::Auth(e.to_string()))?;
        let url = self.resolve(request.target())?;

        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(self.default_headers.clone())
            .headers(request.headers().clone())
            .bearer_auth(token);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(ApiResponse::new(status, headers, body))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Connect(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;

    fn tokens() -> Arc<dyn TokenProvider> {
        Arc::new(StaticTokenProvider::new("token"))
    }

    #[test]
    fn rejects_an_unparsable_base_url() {
        let err = RestClient::new("not a url", tokens(), HeaderMap::new(), Duration::from_secs(5))
            .err()
            .expect("construction should fail");
        assert!(matches!(err, ClientError::BaseUrl { .. }));
    }

    #[test]
    fn targets_resolve_under_the_base_path() {
        let client = RestClient::new(
            "https://example.crm.dynamics.com/api/data/v9.1/",
            tokens(),
            HeaderMap::new(),
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client.resolve("WhoAmI").unwrap();
        assert_eq!(url.as_str(), "https://example.crm.dynamics.com/api/data/v9.1/WhoAmI");
    }

    #[test]
    fn bad_targets_surface_as_transport_errors() {
        let client = RestClient::new(
            "https://example.crm.dynamics.com/api/data/v9.1/",
            tokens(),
            HeaderMap::new(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.resolve("https://[broken").unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
