//! Deploy dispatcher.
//!
//! Polls every active session once per interval and, for each app on the
//! session's cluster, sends a deploy command when the desired sequence differs
//! from the one last dispatched on that session.
//!
//! ```text
//! ClusterSessionRegistry ──snapshot──► DeployDispatcher ──render──► ManifestRenderer
//!                                            │
//!                                            ├── deploy / appInformers ──► session channel
//!                                            └── record_dispatch ──► registry (under lock)
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::service::{spawn_ticker, ServiceHandle};
use super::session::{ClusterSessionRegistry, SessionSnapshot};
use crate::domain::app::App;
use crate::domain::command::{encode_manifests, AgentCommand, DeployAction, DeployCommand};
use crate::domain::id::{AppId, ClusterId};
use crate::domain::release::ReleaseStatus;
use crate::error::{Error, Result};
use crate::port::outbound::render::{ManifestRenderer, RenderedRelease};
use crate::port::outbound::store::Store;

/// Settings for the deploy dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Time between dispatch ticks.
    pub interval: Duration,
    /// Callback path agents post deploy results to.
    pub deploy_result_path: String,
    /// Callback path agents post undeploy results to.
    pub undeploy_result_path: String,
    /// Externally reachable base URL, used to build preflight URIs.
    pub public_url: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deploy_result_path: "/api/v1/deploy/result".into(),
            undeploy_result_path: "/api/v1/undeploy/result".into(),
            public_url: "http://localhost:8800".into(),
        }
    }
}

/// Undeploy request built by the restore coordinator.
#[derive(Debug, Clone)]
pub struct UndeployRequest {
    /// Sequence currently deployed, whose manifests are removed.
    pub sequence: u64,
    pub clear_namespaces: Vec<String>,
    pub clear_pvcs: bool,
}

/// Emits deploy commands when an (app, session) pair falls behind.
pub struct DeployDispatcher {
    registry: Arc<ClusterSessionRegistry>,
    store: Arc<dyn Store>,
    renderer: Arc<dyn ManifestRenderer>,
    settings: DispatchSettings,
    /// (app, cluster, target sequence) whose render failure was already reported.
    failed_renders: Mutex<HashSet<(AppId, ClusterId, u64)>>,
}

impl DeployDispatcher {
    pub fn new(
        registry: Arc<ClusterSessionRegistry>,
        store: Arc<dyn Store>,
        renderer: Arc<dyn ManifestRenderer>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            store,
            renderer,
            settings,
            failed_renders: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Start polling in the background.
    pub fn start(self: Arc<Self>) -> ServiceHandle {
        let interval = self.settings.interval;
        spawn_ticker("deploy-dispatcher", interval, move || {
            let dispatcher = Arc::clone(&self);
            async move {
                dispatcher.tick().await;
            }
        })
    }

    /// Run one pass over every session and app. Returns the number of deploys sent.
    pub async fn tick(&self) -> usize {
        let mut dispatched = 0;

        for session in self.registry.snapshot() {
            let apps = match self.store.list_apps_for_cluster(&session.cluster_id).await {
                Ok(apps) => apps,
                Err(e) => {
                    warn!(cluster = %session.cluster_id, error = %e, "Failed to list apps for cluster");
                    continue;
                }
            };

            for app in apps {
                match self.process_app(&session, &app).await {
                    Ok(true) => dispatched += 1,
                    Ok(false) => {}
                    // Reported by render_or_fail.
                    Err(Error::Render(_)) => continue,
                    Err(e) => {
                        warn!(
                            app = %app.id,
                            cluster = %session.cluster_id,
                            session = %session.session_id,
                            error = %e,
                            "Deploy dispatch failed"
                        );
                        continue;
                    }
                }

                if let Err(e) = self.request_preflights(&session, &app).await {
                    warn!(app = %app.id, session = %session.session_id, error = %e, "Preflight request failed");
                }
            }
        }

        dispatched
    }

    async fn process_app(&self, session: &SessionSnapshot, app: &App) -> Result<bool> {
        if app.is_restoring() {
            trace!(app = %app.id, state = %app.restore_state, "Restore in progress, skipping dispatch");
            return Ok(false);
        }

        let Some(desired) = self
            .store
            .get_desired_sequence(&app.id, &session.cluster_id)
            .await?
        else {
            return Ok(false);
        };

        let previous = self.registry.last_dispatched(&session.session_id, &app.id);
        if previous == Some(desired) {
            return Ok(false);
        }

        self.deploy(session, app, desired, previous).await?;
        Ok(true)
    }

    /// Render `sequence` and send it to one session, bypassing the dispatch memory.
    pub async fn deploy(
        &self,
        session: &SessionSnapshot,
        app: &App,
        sequence: u64,
        previous: Option<u64>,
    ) -> Result<()> {
        let cluster_id = &session.cluster_id;
        let rendered = self.render_or_fail(app, cluster_id, sequence, sequence).await?;
        let previous_manifests = match previous {
            Some(prev) => Some(encode_manifests(
                &self.render_or_fail(app, cluster_id, prev, sequence).await?.manifests,
            )),
            None => None,
        };
        self.forget_render_failures(&app.id, cluster_id);

        let command = DeployCommand {
            app_id: app.id.clone(),
            app_slug: app.slug.clone(),
            action: DeployAction::Deploy,
            sequence,
            kubectl_version: rendered.kubectl_version.clone(),
            additional_namespaces: rendered.additional_namespaces.clone(),
            image_pull_secret: rendered.image_pull_secret.clone(),
            manifests: encode_manifests(&rendered.manifests),
            previous_manifests,
            result_callback_path: self.settings.deploy_result_path.clone(),
            wait: rendered.wait,
            clear_namespaces: Vec::new(),
            clear_pvcs: false,
        };
        session.send(AgentCommand::Deploy(Box::new(command))).await?;

        if !self
            .registry
            .record_dispatch(&session.session_id, &app.id, sequence)
        {
            debug!(session = %session.session_id, "Session disconnected during dispatch");
        }
        info!(
            app = %app.id,
            cluster = %cluster_id,
            session = %session.session_id,
            sequence,
            previous = ?previous,
            "Dispatched deploy"
        );

        self.store
            .set_release_status(&app.id, cluster_id, sequence, ReleaseStatus::Deploying, None)
            .await?;

        if rendered.informers.is_empty() {
            self.store.set_app_status_ready(&app.id, cluster_id).await?;
        } else {
            session
                .send(AgentCommand::AppInformers {
                    app_id: app.id.clone(),
                    informers: rendered.informers,
                })
                .await?;
        }

        Ok(())
    }

    /// Force `sequence` onto every session of a cluster.
    ///
    /// The dispatch memory for the app is cleared first so a concurrent routine
    /// tick cannot suppress the change.
    pub async fn redeploy(&self, app: &App, cluster_id: &ClusterId, sequence: u64) -> Result<usize> {
        self.forget_render_failures(&app.id, cluster_id);
        self.store
            .set_desired_sequence(&app.id, cluster_id, sequence)
            .await?;
        self.registry.clear_dispatched(&app.id);

        let sessions = self.registry.sessions_for_cluster(cluster_id);
        if sessions.is_empty() {
            return Err(Error::NoSession(cluster_id.to_string()));
        }
        for session in &sessions {
            self.deploy(session, app, sequence, None).await?;
        }
        info!(app = %app.id, cluster = %cluster_id, sequence, sessions = sessions.len(), "Forced redeploy");
        Ok(sessions.len())
    }

    /// Build the undeploy of the currently deployed manifests.
    ///
    /// Rendering happens here so a broken release fails before anything is
    /// sent; the same command then goes to every session of the cluster.
    pub async fn undeploy_command(
        &self,
        app: &App,
        request: &UndeployRequest,
    ) -> Result<AgentCommand> {
        let current = self.renderer.render(app, request.sequence).await?;
        Ok(AgentCommand::Deploy(Box::new(DeployCommand {
            app_id: app.id.clone(),
            app_slug: app.slug.clone(),
            action: DeployAction::Undeploy,
            sequence: request.sequence,
            kubectl_version: current.kubectl_version,
            additional_namespaces: current.additional_namespaces,
            image_pull_secret: current.image_pull_secret,
            manifests: String::new(),
            previous_manifests: Some(encode_manifests(&current.manifests)),
            result_callback_path: self.settings.undeploy_result_path.clone(),
            wait: true,
            clear_namespaces: request.clear_namespaces.clone(),
            clear_pvcs: request.clear_pvcs,
        })))
    }

    /// Render one sequence, marking the target release failed if it cannot be.
    ///
    /// The failure is logged and written to the release once per target; later
    /// ticks keep retrying quietly until a render succeeds.
    async fn render_or_fail(
        &self,
        app: &App,
        cluster_id: &ClusterId,
        render_sequence: u64,
        target_sequence: u64,
    ) -> Result<RenderedRelease> {
        let e = match self.renderer.render(app, render_sequence).await {
            Ok(rendered) => return Ok(rendered),
            Err(e) => e,
        };
        let message = format!("failed to render sequence {render_sequence}: {e}");

        let first = self
            .failed_renders
            .lock()
            .insert((app.id.clone(), cluster_id.clone(), target_sequence));
        if !first {
            debug!(app = %app.id, cluster = %cluster_id, sequence = target_sequence, "Render still failing");
            return Err(Error::Render(message));
        }

        warn!(
            app = %app.id,
            cluster = %cluster_id,
            sequence = target_sequence,
            render_sequence,
            error = %e,
            "Render failed, release marked failed"
        );
        if let Err(status_err) = self
            .store
            .set_release_status(
                &app.id,
                cluster_id,
                target_sequence,
                ReleaseStatus::Failed,
                Some(&message),
            )
            .await
        {
            warn!(app = %app.id, error = %status_err, "Failed to record render failure");
        }
        Err(Error::Render(message))
    }

    fn forget_render_failures(&self, app_id: &AppId, cluster_id: &ClusterId) {
        self.failed_renders
            .lock()
            .retain(|(app, cluster, _)| app != app_id || cluster != cluster_id);
    }

    async fn request_preflights(&self, session: &SessionSnapshot, app: &App) -> Result<()> {
        if app.is_restoring() {
            return Ok(());
        }

        let catalog = self
            .store
            .get_release_catalog(&app.id, &session.cluster_id)
            .await?;

        for release in catalog
            .pending()
            .filter(|r| r.status == ReleaseStatus::PendingPreflight)
        {
            let uri = preflight_uri(&self.settings.public_url, &app.slug, release.sequence);
            if !self.registry.mark_preflight_sent(&session.session_id, &uri) {
                continue;
            }
            session
                .send(AgentCommand::Preflight {
                    app_id: app.id.clone(),
                    app_slug: app.slug.clone(),
                    sequence: release.sequence,
                    uri,
                })
                .await?;
            debug!(app = %app.id, sequence = release.sequence, "Requested preflight");
        }
        Ok(())
    }
}

/// URI agents post preflight results for one release to.
#[must_use]
pub fn preflight_uri(public_url: &str, app_slug: &str, sequence: u64) -> String {
    format!(
        "{}/api/v1/preflight/app/{app_slug}/sequence/{sequence}",
        public_url.trim_end_matches('/')
    )
}
