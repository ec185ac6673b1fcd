//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file; the upstream API token comes
//! from the `HARBORMASTER_UPSTREAM_TOKEN` environment variable only.
//!
//! # Example
//!
//! ```no_run
//! use harbormaster::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("harbormaster.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use super::logging::LoggingConfig;
use super::seed::{AppSeed, ClusterConfig};
use super::server::ServerConfig;
use super::service::{DispatchConfig, RestoreConfig, ScannerConfig};
use super::upstream::{UpstreamConfig, UPSTREAM_TOKEN_ENV};
use crate::application::scanner::schedule::UpdateSchedule;
use crate::domain::id::{AppId, ClusterId};
use crate::error::{ConfigError, Result};

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub restore: RestoreConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Agent tokens, one per downstream cluster.
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,

    /// Apps seeded into the in-memory store at startup.
    #[serde(default)]
    pub apps: Vec<AppSeed>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        config.upstream.token = std::env::var(UPSTREAM_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or fails
    /// validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize logging from the `[logging]` section.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Agent token → cluster lookup for the gateway.
    #[must_use]
    pub fn cluster_tokens(&self) -> HashMap<String, ClusterId> {
        self.clusters
            .iter()
            .map(|c| (c.token.clone(), ClusterId::new(c.id.as_str())))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        self.logging
            .log_format()
            .map_err(|e| invalid("logging.format", e))?;
        self.logging
            .filter()
            .map_err(|e| invalid("logging.level", e))?;

        self.server
            .listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| invalid("server.listen_addr", e))?;
        Url::parse(&self.server.public_url).map_err(|e| invalid("server.public_url", e))?;
        Url::parse(&self.upstream.endpoint).map_err(|e| invalid("upstream.endpoint", e))?;

        if self.dispatch.interval_ms == 0 {
            return Err(invalid("dispatch.interval_ms", "must be greater than 0"));
        }
        if self.restore.interval_ms == 0 {
            return Err(invalid("restore.interval_ms", "must be greater than 0"));
        }
        if self.scanner.stale_running_after_secs == 0 {
            return Err(invalid(
                "scanner.stale_running_after_secs",
                "must be greater than 0",
            ));
        }
        for (field, path) in [
            ("dispatch.deploy_result_path", &self.dispatch.deploy_result_path),
            ("dispatch.undeploy_result_path", &self.dispatch.undeploy_result_path),
        ] {
            if !path.starts_with('/') {
                return Err(invalid(field, "must start with '/'"));
            }
        }

        self.validate_clusters()?;
        self.validate_apps()
    }

    fn validate_clusters(&self) -> Result<()> {
        let mut ids = HashSet::new();
        let mut tokens = HashSet::new();
        for cluster in &self.clusters {
            if cluster.id.trim().is_empty() {
                return Err(ConfigError::MissingField { field: "clusters.id" }.into());
            }
            if cluster.token.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "clusters.token",
                }
                .into());
            }
            if !ids.insert(cluster.id.as_str()) {
                return Err(invalid("clusters.id", format!("duplicate cluster {}", cluster.id)));
            }
            if !tokens.insert(cluster.token.as_str()) {
                return Err(invalid(
                    "clusters.token",
                    format!("token of cluster {} is already in use", cluster.id),
                ));
            }
        }
        Ok(())
    }

    fn validate_apps(&self) -> Result<()> {
        let clusters: HashSet<&str> = self.clusters.iter().map(|c| c.id.as_str()).collect();
        let mut ids = HashSet::new();

        for app in &self.apps {
            if app.id.trim().is_empty() {
                return Err(ConfigError::MissingField { field: "apps.id" }.into());
            }
            if !ids.insert(app.id.as_str()) {
                return Err(invalid("apps.id", format!("duplicate app {}", app.id)));
            }

            UpdateSchedule::parse(&app.update_check_schedule, &AppId::new(app.id.as_str()))
                .map_err(|e| invalid("apps.update_check_schedule", e))?;

            if let Some(unknown) = app.clusters.iter().find(|c| !clusters.contains(c.as_str())) {
                return Err(invalid(
                    "apps.clusters",
                    format!("app {} references unknown cluster {unknown}", app.id),
                ));
            }

            let mut sequences = HashSet::new();
            if let Some(dup) = app.releases.iter().find(|r| !sequences.insert(r.sequence)) {
                return Err(invalid(
                    "apps.releases",
                    format!("app {} has duplicate sequence {}", app.id, dup.sequence),
                ));
            }
            if let Some(deployed) = app.deployed_sequence {
                if !sequences.contains(&deployed) {
                    return Err(invalid(
                        "apps.deployed_sequence",
                        format!("app {} has no release with sequence {deployed}", app.id),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl ToString) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}
