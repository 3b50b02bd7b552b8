//! Daemon configuration loaded from a JSON settings file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde::Deserialize;
use thiserror::Error;

use crate::backoff::Backoff;
use crate::policy::Policy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub auth: AuthSettings,
    pub api: ApiSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Client-credentials settings for the authority.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Must be of the `resource/.default` shape for client-credentials
    /// flows.
    pub scope: String,
}

/// Remote API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    /// Headers stamped onto every request (e.g. `Accept`, OData version
    /// pins for a Dataverse-style API).
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    #[serde(default = "ApiSettings::default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Path probed at startup to prove the pipeline end to end.
    #[serde(default = "ApiSettings::default_probe_path")]
    pub probe_path: String,
}

impl ApiSettings {
    fn default_timeout_secs() -> u64 {
        30
    }

    fn default_probe_path() -> String {
        "WhoAmI".to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse the configured header map into typed headers.
    pub fn default_headers(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::Invalid(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::Invalid(format!("header value for '{name}': {e}")))?;
            headers.insert(header, value);
        }
        Ok(headers)
    }
}

/// Tuning for the standard retrying policy.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "RetrySettings::default_max_attempts")]
    pub max_attempts: u32,
    /// Base of the exponential ladder in seconds; the stock value of 2
    /// yields 2^n-second waits.
    #[serde(default = "RetrySettings::default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Optional ceiling on the computed wait.
    #[serde(default)]
    pub max_backoff_secs: Option<u64>,
}

impl RetrySettings {
    fn default_max_attempts() -> u32 {
        3
    }

    fn default_backoff_base_secs() -> u64 {
        2
    }

    /// Build the retrying policy these settings describe.
    pub fn retrying_policy(&self) -> Result<Policy, ConfigError> {
        let mut backoff = Backoff::exponential(Duration::from_secs(self.backoff_base_secs));
        if let Some(cap) = self.max_backoff_secs {
            backoff = backoff
                .with_max(Duration::from_secs(cap))
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(Policy::builder().max_attempts(self.max_attempts).backoff(backoff).build())
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            backoff_base_secs: Self::default_backoff_base_secs(),
            max_backoff_secs: None,
        }
    }
}

impl AppConfig {
    /// Load and validate settings from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: display.clone(), source })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: display, source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("auth.token_url", &self.auth.token_url),
            ("auth.client_id", &self.auth.client_id),
            ("auth.client_secret", &self.auth.client_secret),
            ("auth.scope", &self.auth.scope),
            ("api.base_url", &self.api.base_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}
