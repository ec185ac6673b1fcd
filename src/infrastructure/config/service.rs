//! Background loop configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::dispatch::DispatchSettings;
use crate::application::restore::RestoreSettings;
use crate::application::scanner::ScannerSettings;

/// `[dispatch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_deploy_result_path")]
    pub deploy_result_path: String,
    #[serde(default = "default_undeploy_result_path")]
    pub undeploy_result_path: String,
}

/// `[restore]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// `[scanner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Age after which a `running` update check is considered abandoned.
    #[serde(default = "default_stale_running_after_secs")]
    pub stale_running_after_secs: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_deploy_result_path() -> String {
    "/api/v1/deploy/result".into()
}

fn default_undeploy_result_path() -> String {
    "/api/v1/undeploy/result".into()
}

fn default_stale_running_after_secs() -> u64 {
    3600
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            deploy_result_path: default_deploy_result_path(),
            undeploy_result_path: default_undeploy_result_path(),
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            stale_running_after_secs: default_stale_running_after_secs(),
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub fn settings(&self, public_url: &str) -> DispatchSettings {
        DispatchSettings {
            interval: Duration::from_millis(self.interval_ms),
            deploy_result_path: self.deploy_result_path.clone(),
            undeploy_result_path: self.undeploy_result_path.clone(),
            public_url: public_url.to_string(),
        }
    }
}

impl RestoreConfig {
    #[must_use]
    pub fn settings(&self) -> RestoreSettings {
        RestoreSettings {
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

impl ScannerConfig {
    #[must_use]
    pub fn settings(&self) -> ScannerSettings {
        ScannerSettings {
            stale_running_after: Duration::from_secs(self.stale_running_after_secs),
        }
    }
}
