//! Restore coordinator.
//!
//! Drives every app whose restore flag is set through
//! undeploy → restore → redeploy, one step per tick. All progress lives in the
//! app's persisted [`RestoreState`], so an abandoned tick is simply retried by
//! the next one.
//!
//! | State                                     | Tick action                                   |
//! |-------------------------------------------|-----------------------------------------------|
//! | `None`, `UndeployRequested`               | move to `UndeployInProgress`, send undeploy   |
//! | `UndeployInProgress`                      | wait for the agent's undeploy result          |
//! | `UndeployCompleted`, `RestoreCreated`, `RestorePolling` | create or inspect the restore  |
//! | `RedeployTriggered`, `RestoreFailed`      | clear the restore flag                        |

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use super::dispatch::{DeployDispatcher, UndeployRequest};
use super::service::{spawn_ticker, ServiceHandle};
use super::session::ClusterSessionRegistry;
use crate::domain::app::App;
use crate::domain::backup::{Backup, RestorePhase};
use crate::domain::restore::{RestoreEvent, RestoreState};
use crate::error::{Error, Result};
use crate::port::outbound::snapshot::BackupService;
use crate::port::outbound::store::Store;
use crate::port::outbound::support_bundle::SupportBundleCollector;

/// Settings for the restore coordinator.
#[derive(Debug, Clone)]
pub struct RestoreSettings {
    /// Time between restore ticks.
    pub interval: Duration,
}

impl Default for RestoreSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Sequences undeploy, restore and redeploy for apps being restored.
pub struct RestoreCoordinator {
    registry: Arc<ClusterSessionRegistry>,
    store: Arc<dyn Store>,
    backups: Arc<dyn BackupService>,
    dispatcher: Arc<DeployDispatcher>,
    support_bundles: Arc<dyn SupportBundleCollector>,
    settings: RestoreSettings,
}

impl RestoreCoordinator {
    pub fn new(
        registry: Arc<ClusterSessionRegistry>,
        store: Arc<dyn Store>,
        backups: Arc<dyn BackupService>,
        dispatcher: Arc<DeployDispatcher>,
        support_bundles: Arc<dyn SupportBundleCollector>,
        settings: RestoreSettings,
    ) -> Self {
        Self {
            registry,
            store,
            backups,
            dispatcher,
            support_bundles,
            settings,
        }
    }

    /// Start polling in the background.
    pub fn start(self: Arc<Self>) -> ServiceHandle {
        let interval = self.settings.interval;
        spawn_ticker("restore-coordinator", interval, move || {
            let coordinator = Arc::clone(&self);
            async move {
                coordinator.tick().await;
            }
        })
    }

    /// Advance every restoring app by one step. Returns how many apps were visited.
    pub async fn tick(&self) -> usize {
        let apps = match self.store.list_apps().await {
            Ok(apps) => apps,
            Err(e) => {
                warn!(error = %e, "Failed to list apps for restore");
                return 0;
            }
        };

        let mut visited = 0;
        for app in apps.iter().filter(|a| a.restore_in_progress.is_some()) {
            visited += 1;
            if let Err(e) = self.process_app(app).await {
                warn!(app = %app.id, state = %app.restore_state, error = %e, "Restore tick abandoned");
            }
        }
        visited
    }

    async fn process_app(&self, app: &App) -> Result<()> {
        let Some(backup_name) = app.restore_in_progress.as_deref() else {
            return Ok(());
        };

        match app.restore_state {
            RestoreState::UndeployInProgress => {
                trace!(app = %app.id, "Waiting for undeploy result");
                Ok(())
            }
            RestoreState::None | RestoreState::UndeployRequested => {
                self.start_undeploy(app, backup_name).await
            }
            RestoreState::UndeployCompleted
            | RestoreState::RestoreCreated
            | RestoreState::RestorePolling => self.drive_restore(app, backup_name).await,
            RestoreState::RedeployTriggered | RestoreState::RestoreFailed => {
                self.clear(app, app.restore_state).await
            }
        }
    }

    async fn start_undeploy(&self, app: &App, backup_name: &str) -> Result<()> {
        let Some(backup) = self.backups.get_backup(backup_name).await? else {
            error!(app = %app.id, backup = backup_name, "Backup not found, abandoning restore");
            let state = self
                .advance(app, app.restore_state, RestoreEvent::BackupMissing)
                .await?;
            return self.clear(app, state).await;
        };

        // Everything that can fail before sending is resolved first, so the
        // state only moves once the commands are ready to go out.
        let mut outbox = Vec::new();
        for cluster_id in self.store.list_clusters_for_app(&app.id).await? {
            let Some(sequence) = self
                .store
                .get_desired_sequence(&app.id, &cluster_id)
                .await?
            else {
                continue;
            };

            let sessions = self.registry.sessions_for_cluster(&cluster_id);
            if sessions.is_empty() {
                return Err(Error::NoSession(cluster_id.to_string()));
            }

            let request = UndeployRequest {
                sequence,
                clear_namespaces: backup.included_namespaces.clone(),
                clear_pvcs: true,
            };
            let command = self.dispatcher.undeploy_command(app, &request).await?;
            outbox.extend(sessions.into_iter().map(|s| (s, sequence, command.clone())));
        }

        // Persisted before sending: the agent may answer before send returns.
        let state = self
            .advance(app, app.restore_state, RestoreEvent::UndeployDispatched)
            .await?;
        if outbox.is_empty() {
            debug!(app = %app.id, "Nothing deployed, undeploy is already complete");
            self.advance(app, state, RestoreEvent::UndeployCompleted).await?;
            return Ok(());
        }

        for (session, sequence, command) in outbox {
            if let Err(e) = session.send(command).await {
                self.rollback_undeploy(app).await?;
                return Err(e);
            }
            info!(
                app = %app.id,
                session = %session.session_id,
                sequence,
                namespaces = ?backup.included_namespaces,
                "Dispatched undeploy"
            );
        }
        Ok(())
    }

    /// Return to `UndeployRequested` after a failed send.
    ///
    /// Reads the stored state first so a result that already arrived is kept.
    async fn rollback_undeploy(&self, app: &App) -> Result<()> {
        let Some(current) = self.store.get_app(&app.id).await? else {
            return Ok(());
        };
        if current.restore_state == RestoreState::UndeployInProgress {
            self.advance(app, current.restore_state, RestoreEvent::UndeployUnsent)
                .await?;
        }
        Ok(())
    }

    async fn drive_restore(&self, app: &App, backup_name: &str) -> Result<()> {
        let backup = self
            .backups
            .get_backup(backup_name)
            .await?
            .ok_or_else(|| Error::Snapshot(format!("backup {backup_name} not found")))?;
        let restore_name = backup.restore_name(&app.slug);

        let Some(restore) = self.backups.get_restore(&restore_name).await? else {
            self.backups
                .create_restore(&restore_name, &backup, backup.restore_selector(&app.slug))
                .await?;
            info!(app = %app.id, backup = backup_name, restore = %restore_name, "Created restore");
            let state = self
                .advance(app, app.restore_state, RestoreEvent::RestoreCreated)
                .await?;
            self.advance(app, state, RestoreEvent::PollStarted).await?;
            return Ok(());
        };

        match restore.phase {
            RestorePhase::Completed => self.complete(app, &backup).await,
            phase if phase.is_failed() => {
                error!(
                    app = %app.id,
                    restore = %restore_name,
                    phase = ?phase,
                    "Restore failed, app left undeployed"
                );
                let state = self
                    .advance(app, app.restore_state, RestoreEvent::RestoreFailed)
                    .await?;
                self.clear(app, state).await
            }
            phase => {
                trace!(app = %app.id, restore = %restore_name, phase = ?phase, "Restore still running");
                if app.restore_state != RestoreState::RestorePolling {
                    self.advance(app, app.restore_state, RestoreEvent::PollStarted)
                        .await?;
                }
                Ok(())
            }
        }
    }

    async fn complete(&self, app: &App, backup: &Backup) -> Result<()> {
        let sequence = backup.sequence_for(&app.slug)?;

        for cluster_id in self.store.list_clusters_for_app(&app.id).await? {
            self.dispatcher.redeploy(app, &cluster_id, sequence).await?;
        }

        let state = self
            .advance(app, app.restore_state, RestoreEvent::RestoreCompleted)
            .await?;
        info!(app = %app.id, backup = %backup.name, sequence, "Restore completed, redeployed");

        if let Err(e) = self.support_bundles.collect(app).await {
            warn!(app = %app.id, error = %e, "Post-restore support bundle failed");
        }

        self.clear(app, state).await
    }

    async fn clear(&self, app: &App, state: RestoreState) -> Result<()> {
        self.advance(app, state, RestoreEvent::Cleared).await?;
        self.store.clear_restore(&app.id).await?;
        info!(app = %app.id, from = %state, "Restore flag cleared");
        Ok(())
    }

    /// Apply one transition from the table, persisting the new state.
    ///
    /// Pairs missing from the table are logged and leave the state unchanged.
    async fn advance(
        &self,
        app: &App,
        from: RestoreState,
        event: RestoreEvent,
    ) -> Result<RestoreState> {
        match from.transition(event) {
            Some(next) => {
                self.store.set_restore_state(&app.id, next).await?;
                debug!(app = %app.id, from = %from, to = %next, event = ?event, "Restore state advanced");
                Ok(next)
            }
            None => {
                warn!(app = %app.id, state = %from, event = ?event, "Ignoring restore event not valid in this state");
                Ok(from)
            }
        }
    }
}
