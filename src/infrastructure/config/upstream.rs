//! Upstream release service configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::adapter::outbound::upstream::UpstreamSettings;

/// Environment variable holding the upstream API token.
pub const UPSTREAM_TOKEN_ENV: &str = "HARBORMASTER_UPSTREAM_TOKEN";

/// `[upstream]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// API token, read from [`UPSTREAM_TOKEN_ENV`] only.
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_endpoint() -> String {
    "https://upstream.example.com/".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            token: None,
        }
    }
}

impl UpstreamConfig {
    #[must_use]
    pub fn settings(&self) -> UpstreamSettings {
        UpstreamSettings {
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            retry_max_attempts: self.retry_max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}
