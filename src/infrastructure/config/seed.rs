//! Cluster credentials and app seed records.

use serde::Deserialize;

use crate::domain::app::{App, DEFAULT_SCHEDULE};
use crate::domain::policy::AutoDeploy;
use crate::domain::release::{Release, ReleaseStatus};

/// One `[[clusters]]` entry: the token an agent presents and its cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    pub id: String,
    pub token: String,
}

/// One `[[apps]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSeed {
    pub id: String,
    /// Defaults to the app ID.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_schedule")]
    pub update_check_schedule: String,
    #[serde(default)]
    pub auto_deploy: AutoDeploy,
    #[serde(default)]
    pub is_airgap: bool,
    #[serde(default)]
    pub rollback_allowed: bool,
    /// Cluster IDs the app runs on.
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default)]
    pub releases: Vec<ReleaseSeed>,
    /// Sequence currently deployed on every listed cluster.
    #[serde(default)]
    pub deployed_sequence: Option<u64>,
}

/// One `[[apps.releases]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSeed {
    pub sequence: u64,
    pub cursor: String,
    pub label: String,
    #[serde(default = "default_release_status")]
    pub status: ReleaseStatus,
}

fn default_channel() -> String {
    "stable".into()
}

fn default_schedule() -> String {
    DEFAULT_SCHEDULE.into()
}

fn default_release_status() -> ReleaseStatus {
    ReleaseStatus::Pending
}

impl AppSeed {
    #[must_use]
    pub fn to_app(&self) -> App {
        let slug = self.slug.clone().unwrap_or_else(|| self.id.clone());
        let mut app = App::new(self.id.as_str(), slug, self.channel.as_str());
        app.update_check_schedule = self.update_check_schedule.clone();
        app.auto_deploy = self.auto_deploy;
        app.is_airgap = self.is_airgap;
        app
    }

    #[must_use]
    pub fn to_releases(&self) -> Vec<Release> {
        self.releases
            .iter()
            .map(|r| Release {
                sequence: r.sequence,
                cursor: r.cursor.clone(),
                label: r.label.clone(),
                channel_id: self.channel.clone(),
                status: r.status,
            })
            .collect()
    }
}
