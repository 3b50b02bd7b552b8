//! Bearer-token acquisition for the daemon host.
//!
//! The dispatch core never constructs or refreshes credentials; it only sees
//! [`crate::request::Transport`]. This module supplies the opaque "get
//! bearer token" capability behind that transport: a [`TokenProvider`] trait
//! plus an OAuth2 client-credentials implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Errors from token acquisition.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token request itself failed at the HTTP layer.
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The authority answered with a non-success status.
    #[error("token endpoint rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    /// Client-credentials scopes must be of the `resource/.default` shape;
    /// the authority rejects anything else with a distinctive error code.
    #[error("scope '{scope}' not accepted by the authority")]
    ScopeNotSupported { scope: String },
    /// The authority answered 2xx but the body was not a token response.
    #[error("malformed token response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Opaque source of bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer token, fetched or refreshed as needed.
    async fn bearer_token(&self) -> Result<String, AuthError>;
}

/// Fixed token, for tests and pre-issued credentials.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "TokenResponse::default_expiry")]
    expires_in: u64,
}

impl TokenResponse {
    fn default_expiry() -> u64 {
        3600
    }
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Refresh this long before the authority's stated expiry.
const EXPIRY_LEEWAY: Duration = Duration::from_secs(60);

/// OAuth2 client-credentials flow against a token endpoint. Tokens are
/// cached and refreshed shortly before expiry, so callers can ask for the
/// token on every request without hammering the authority.
pub struct ClientCredentialsProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsProvider {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = self.http.post(&self.token_url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let parsed = parse_token_response(status, &body, &self.scope)?;
        let ttl = Duration::from_secs(parsed.expires_in).saturating_sub(EXPIRY_LEEWAY);
        Ok(CachedToken { token: parsed.access_token, expires_at: Instant::now() + ttl })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.expires_at > Instant::now() {
                return Ok(entry.token.clone());
            }
        }
        let fresh = self.fetch().await?;
        debug!("bearer token refreshed");
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

fn parse_token_response(
    status: StatusCode,
    body: &str,
    scope: &str,
) -> Result<TokenResponse, AuthError> {
    if !status.is_success() {
        // AADSTS70011 is the authority's "scope is not resource/.default"
        // rejection; name it so operators fix the scope instead of chasing
        // HTTP noise.
        if body.contains("AADSTS70011") || body.contains("invalid_scope") {
            return Err(AuthError::ScopeNotSupported { scope: scope.to_string() });
        }
        return Err(AuthError::Rejected { status: status.as_u16(), body: body.to_string() });
    }
    Ok(serde_json::from_str(body)?)
}
