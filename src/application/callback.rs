//! Handling of results reported back by agents.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::command::AgentMessage;
use crate::domain::id::{AppId, ClusterId};
use crate::domain::release::ReleaseStatus;
use crate::domain::restore::{RestoreEvent, RestoreState};
use crate::error::Result;
use crate::port::inbound::callback::ResultHandler;
use crate::port::outbound::store::Store;

/// Applies deploy and undeploy results to persisted state.
pub struct ResultCallbacks {
    store: Arc<dyn Store>,
}

impl ResultCallbacks {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record the outcome of a deploy on a cluster.
    pub async fn deploy_result(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
        sequence: u64,
        success: bool,
        output: &str,
    ) -> Result<()> {
        let (status, message) = if success {
            (ReleaseStatus::Deployed, None)
        } else {
            warn!(app = %app_id, cluster = %cluster_id, sequence, output, "Agent reported deploy failure");
            (ReleaseStatus::Failed, Some(output))
        };
        self.store
            .set_release_status(app_id, cluster_id, sequence, status, message)
            .await?;
        info!(app = %app_id, cluster = %cluster_id, sequence, %status, "Deploy result recorded");
        Ok(())
    }

    /// Advance a restore waiting on its undeploy.
    ///
    /// Results that arrive while no undeploy is outstanding are ignored.
    pub async fn undeploy_result(&self, app_id: &AppId, success: bool, output: &str) -> Result<()> {
        let Some(app) = self.store.get_app(app_id).await? else {
            warn!(app = %app_id, "Undeploy result for unknown app");
            return Ok(());
        };

        if app.restore_state != RestoreState::UndeployInProgress {
            warn!(app = %app_id, state = %app.restore_state, "Ignoring undeploy result outside an undeploy");
            return Ok(());
        }

        let event = if success {
            RestoreEvent::UndeployCompleted
        } else {
            RestoreEvent::UndeployFailed
        };
        let Some(next) = app.restore_state.transition(event) else {
            return Ok(());
        };
        self.store.set_restore_state(app_id, next).await?;

        if success {
            info!(app = %app_id, "Undeploy completed");
        } else {
            warn!(app = %app_id, output, "Undeploy failed, restore abandoned");
        }
        Ok(())
    }
}

#[async_trait]
impl ResultHandler for ResultCallbacks {
    async fn handle(&self, cluster_id: &ClusterId, message: AgentMessage) -> Result<()> {
        match message {
            AgentMessage::DeployResult {
                app_id,
                sequence,
                success,
                output,
            } => {
                self.deploy_result(&app_id, cluster_id, sequence, success, &output)
                    .await
            }
            AgentMessage::UndeployResult {
                app_id,
                success,
                output,
            } => self.undeploy_result(&app_id, success, &output).await,
        }
    }
}
