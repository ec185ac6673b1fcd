//! Managed application record.

use serde::{Deserialize, Serialize};

use super::id::AppId;
use super::policy::AutoDeploy;
use super::restore::RestoreState;

/// Schedule spec meaning "use the default update check schedule".
pub const DEFAULT_SCHEDULE: &str = "@default";

/// An application managed by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: AppId,
    pub slug: String,
    /// Channel the app follows upstream.
    pub channel_id: String,
    /// Update check schedule (`@never`, `@default`, or a cron expression).
    pub update_check_schedule: String,
    /// Automatic deploy tier applied by scheduled checks.
    pub auto_deploy: AutoDeploy,
    /// Airgapped apps never talk to the upstream.
    pub is_airgap: bool,
    /// Backup name while a restore is in progress.
    pub restore_in_progress: Option<String>,
    pub restore_state: RestoreState,
}

impl App {
    /// New app with default schedule and no automatic deploys.
    pub fn new(id: impl Into<AppId>, slug: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            channel_id: channel_id.into(),
            update_check_schedule: DEFAULT_SCHEDULE.to_string(),
            auto_deploy: AutoDeploy::Disabled,
            is_airgap: false,
            restore_in_progress: None,
            restore_state: RestoreState::None,
        }
    }

    /// True when the restore flag is set or the state machine has not settled.
    #[must_use]
    pub fn is_restoring(&self) -> bool {
        self.restore_in_progress.is_some() || self.restore_state != RestoreState::None
    }
}
