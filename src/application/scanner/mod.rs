//! Update scanner.
//!
//! Each app with a schedule gets one background job that periodically syncs
//! its license, fetches newer upstream releases, persists them and lets the
//! [`DeployDecisionEngine`] pick a new desired sequence per cluster. The same
//! check is exposed for manual "check now" requests through
//! [`UpdateScanner::check_for_updates`].
//!
//! At most one check runs per app. A check holds an in-process marker for its
//! whole duration and a persisted `update-download:<app>` task status that
//! users can see; a persisted `running` status older than the configured
//! staleness window is assumed abandoned and taken over.

pub mod schedule;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use self::schedule::UpdateSchedule;
use super::decision::DeployDecisionEngine;
use super::service::ServiceHandle;
use crate::domain::app::App;
use crate::domain::id::{AppId, ClusterId};
use crate::domain::policy::DeployPolicy;
use crate::domain::task::{update_download_task, TaskStatus};
use crate::error::{Error, Result};
use crate::port::outbound::store::Store;
use crate::port::outbound::upstream::{UpdateQuery, UpstreamClient};

/// Settings for the update scanner.
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    /// Age after which a persisted `running` marker is considered abandoned.
    pub stale_running_after: Duration,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            stale_running_after: Duration::from_secs(3600),
        }
    }
}

/// Parameters of one update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub app_id: AppId,
    /// Deploy the newest release.
    pub deploy_latest: bool,
    /// Deploy the release with this label.
    pub deploy_version_label: Option<String>,
    /// Apply the app's automatic deploy tier.
    pub is_automatic: bool,
    /// Persist new releases without waiting on preflight checks.
    pub skip_preflights: bool,
}

impl CheckRequest {
    /// Request issued by an app's schedule.
    pub fn scheduled(app_id: AppId) -> Self {
        Self {
            app_id,
            deploy_latest: false,
            deploy_version_label: None,
            is_automatic: true,
            skip_preflights: false,
        }
    }

    /// Manual check that only fetches and persists.
    pub fn manual(app_id: AppId) -> Self {
        Self {
            is_automatic: false,
            ..Self::scheduled(app_id)
        }
    }
}

/// What a completed check did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCheckReport {
    /// Updates the upstream advertised, license update included.
    pub available_updates: usize,
    /// Sequences persisted by this check, in persist order.
    pub persisted_sequences: Vec<u64>,
    /// New desired sequence per cluster.
    pub desired: Vec<(ClusterId, u64)>,
}

/// Result of [`UpdateScanner::check_for_updates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheckOutcome {
    /// Another check for the app was in flight.
    AlreadyRunning,
    Completed(UpdateCheckReport),
}

/// Removes the in-process running marker when dropped.
struct RunningGuard {
    running: Arc<Mutex<HashSet<AppId>>>,
    app_id: AppId,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.lock().remove(&self.app_id);
    }
}

/// Scheduled and on-demand update checks.
pub struct UpdateScanner {
    store: Arc<dyn Store>,
    upstream: Arc<dyn UpstreamClient>,
    engine: DeployDecisionEngine,
    settings: ScannerSettings,
    running: Arc<Mutex<HashSet<AppId>>>,
    jobs: Mutex<HashMap<AppId, ServiceHandle>>,
}

impl UpdateScanner {
    pub fn new(
        store: Arc<dyn Store>,
        upstream: Arc<dyn UpstreamClient>,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            store,
            upstream,
            engine: DeployDecisionEngine::new(),
            settings,
            running: Arc::new(Mutex::new(HashSet::new())),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Configure jobs for every app. Apps with invalid schedules are skipped.
    pub async fn start_all(self: &Arc<Self>) -> Result<usize> {
        let mut scheduled = 0;
        for app in self.store.list_apps().await? {
            match self.configure(&app).await {
                Ok(true) => scheduled += 1,
                Ok(false) => {}
                Err(e) => warn!(app = %app.id, error = %e, "Update checks not scheduled"),
            }
        }
        info!(scheduled, "Update scanner started");
        Ok(scheduled)
    }

    /// (Re)schedule checks for `app`. Returns whether a job is now running.
    pub async fn configure(self: &Arc<Self>, app: &App) -> Result<bool> {
        let schedule = UpdateSchedule::parse(&app.update_check_schedule, &app.id)?;
        self.stop(&app.id).await;

        if schedule.is_never() || app.is_airgap {
            debug!(app = %app.id, airgap = app.is_airgap, "Scheduled update checks disabled");
            return Ok(false);
        }

        let handle = self.spawn_job(app.id.clone(), schedule);
        self.jobs.lock().insert(app.id.clone(), handle);
        info!(app = %app.id, schedule = %app.update_check_schedule, "Scheduled update checks");
        Ok(true)
    }

    /// Cancel the job for one app, if any.
    pub async fn stop(&self, app_id: &AppId) -> bool {
        let handle = self.jobs.lock().remove(app_id);
        match handle {
            Some(handle) => {
                handle.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Cancel every job.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.jobs.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }

    /// Apps with a scheduled job.
    #[must_use]
    pub fn scheduled_apps(&self) -> Vec<AppId> {
        let mut apps: Vec<_> = self.jobs.lock().keys().cloned().collect();
        apps.sort();
        apps
    }

    fn spawn_job(self: &Arc<Self>, app_id: AppId, schedule: UpdateSchedule) -> ServiceHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scanner = Arc::clone(self);

        let task = tokio::spawn(async move {
            while let Some(next) = schedule.next_after(Utc::now()) {
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    () = tokio::time::sleep(wait) => {
                        let request = CheckRequest::scheduled(app_id.clone());
                        match scanner.check_for_updates(request).await {
                            Ok(UpdateCheckOutcome::AlreadyRunning) => {
                                debug!(app = %app_id, "Scheduled check skipped, already running");
                            }
                            Ok(UpdateCheckOutcome::Completed(report)) => {
                                debug!(app = %app_id, persisted = report.persisted_sequences.len(), "Scheduled check finished");
                            }
                            Err(e) => warn!(app = %app_id, error = %e, "Scheduled update check failed"),
                        }
                    }
                }
            }
        });

        ServiceHandle::from_parts("update-scanner", shutdown_tx, task)
    }

    /// Run one update check now.
    pub async fn check_for_updates(&self, request: CheckRequest) -> Result<UpdateCheckOutcome> {
        let app = self
            .store
            .get_app(&request.app_id)
            .await?
            .ok_or_else(|| Error::Store(format!("app {} not found", request.app_id)))?;

        let Some(_guard) = self.try_begin(&app.id) else {
            return Ok(UpdateCheckOutcome::AlreadyRunning);
        };

        let task_id = update_download_task(&app.id);
        if let Some(status) = self.store.get_task_status(&task_id).await? {
            if status.is_running() {
                let age = (Utc::now() - status.updated_at).to_std().unwrap_or_default();
                if age < self.settings.stale_running_after {
                    return Ok(UpdateCheckOutcome::AlreadyRunning);
                }
                warn!(app = %app.id, age_secs = age.as_secs(), "Taking over stale update check");
            }
        }

        self.store
            .set_task_status(&task_id, TaskStatus::running("Checking for updates"))
            .await?;

        match self.run_check(&app, &request).await {
            Ok(report) => {
                self.store.clear_task_status(&task_id).await?;
                info!(
                    app = %app.id,
                    available = report.available_updates,
                    persisted = ?report.persisted_sequences,
                    desired = ?report.desired,
                    "Update check completed"
                );
                Ok(UpdateCheckOutcome::Completed(report))
            }
            Err(e) => {
                let retryable = !e.is_actionable();
                error!(app = %app.id, retryable, error = %e, "Update check failed");
                if let Err(status_err) = self
                    .store
                    .set_task_status(&task_id, TaskStatus::failed(e.to_string(), retryable))
                    .await
                {
                    warn!(app = %app.id, error = %status_err, "Failed to record update check failure");
                }
                Err(e)
            }
        }
    }

    fn try_begin(&self, app_id: &AppId) -> Option<RunningGuard> {
        if !self.running.lock().insert(app_id.clone()) {
            return None;
        }
        Some(RunningGuard {
            running: Arc::clone(&self.running),
            app_id: app_id.clone(),
        })
    }

    async fn run_check(&self, app: &App, request: &CheckRequest) -> Result<UpdateCheckReport> {
        let clusters = self.store.list_clusters_for_app(&app.id).await?;
        let mut report = UpdateCheckReport::default();

        let persist_error = if app.is_airgap {
            debug!(app = %app.id, "Airgapped app, skipping upstream");
            None
        } else {
            self.fetch_and_persist(app, &clusters, request, &mut report)
                .await?
        };

        // Clusters are decided independently; the first failure is reported
        // after the rest have been tried, an actionable one taking priority.
        let mut decision_error: Option<Error> = None;
        if let Some(policy) = DeployPolicy::derive(
            request.deploy_latest,
            request.deploy_version_label.as_deref(),
            request.is_automatic,
            app.auto_deploy,
        ) {
            for cluster_id in &clusters {
                match self.decide_cluster(app, cluster_id, &policy).await {
                    Ok(Some(sequence)) => report.desired.push((cluster_id.clone(), sequence)),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(app = %app.id, cluster = %cluster_id, %policy, error = %e, "Deploy decision failed for cluster");
                        decision_error = Some(match decision_error {
                            Some(kept) if kept.is_actionable() || !e.is_actionable() => kept,
                            _ => e,
                        });
                    }
                }
            }
        }

        match persist_error.or(decision_error) {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Apply the policy to one cluster's catalog, recording the chosen sequence.
    async fn decide_cluster(
        &self,
        app: &App,
        cluster_id: &ClusterId,
        policy: &DeployPolicy,
    ) -> Result<Option<u64>> {
        let catalog = self
            .store
            .get_release_catalog(&app.id, cluster_id)
            .await?;
        let selected = self
            .engine
            .select_desired_sequence(policy, &catalog, self.store.as_ref())
            .await?;
        if let Some(sequence) = selected {
            self.store
                .set_desired_sequence(&app.id, cluster_id, sequence)
                .await?;
            info!(app = %app.id, cluster = %cluster_id, sequence, %policy, "Desired sequence updated");
        }
        Ok(selected)
    }

    /// Sync the license, fetch and persist updates.
    ///
    /// A persist failure stops the batch and is handed back so the decision
    /// step still sees what was persisted before it.
    async fn fetch_and_persist(
        &self,
        app: &App,
        clusters: &[ClusterId],
        request: &CheckRequest,
        report: &mut UpdateCheckReport,
    ) -> Result<Option<Error>> {
        let mut updates = Vec::new();
        if let Some(license_update) = self.upstream.sync_license(app).await? {
            debug!(app = %app.id, cursor = %license_update.cursor, "License sync produced an update");
            updates.push(license_update);
        }

        let query = UpdateQuery {
            current_cursor: self.current_cursor(app, clusters).await?,
            channel_id: app.channel_id.clone(),
            since: self.store.last_update_check(&app.id).await?,
        };
        updates.extend(self.upstream.fetch_updates(app, &query).await?);
        report.available_updates = updates.len();

        let total = updates.len();
        for (index, update) in updates.iter().enumerate() {
            let last = index + 1 == total;
            let mut downloaded = match self.upstream.download_update(app, update).await {
                Ok(downloaded) => downloaded,
                Err(e) if !last => {
                    warn!(app = %app.id, cursor = %update.cursor, error = %e, "Skipping update that failed to download");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if request.skip_preflights {
                downloaded.has_preflight = false;
            }

            match self.store.create_release(&app.id, &downloaded).await {
                Ok(sequence) => {
                    debug!(app = %app.id, sequence, label = %update.version_label, "Persisted release");
                    report.persisted_sequences.push(sequence);
                }
                Err(e) => {
                    error!(app = %app.id, cursor = %update.cursor, error = %e, "Failed to persist release, stopping batch");
                    return Ok(Some(e));
                }
            }
        }

        self.store.set_last_update_check(&app.id, Utc::now()).await?;
        Ok(None)
    }

    /// Cursor of the newest release across the app's clusters.
    async fn current_cursor(&self, app: &App, clusters: &[ClusterId]) -> Result<Option<String>> {
        let mut newest: Option<(u64, String)> = None;
        for cluster_id in clusters {
            let catalog = self.store.get_release_catalog(&app.id, cluster_id).await?;
            if let Some(latest) = catalog.latest() {
                if newest.as_ref().map_or(true, |(seq, _)| latest.sequence > *seq) {
                    newest = Some((latest.sequence, latest.cursor.clone()));
                }
            }
        }
        Ok(newest.map(|(_, cursor)| cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_requests_are_automatic() {
        let request = CheckRequest::scheduled(AppId::new("a"));
        assert!(request.is_automatic);
        assert!(!CheckRequest::manual(AppId::new("a")).is_automatic);
    }

    #[test]
    fn running_guard_releases_marker() {
        let running = Arc::new(Mutex::new(HashSet::new()));
        running.lock().insert(AppId::new("a"));
        drop(RunningGuard {
            running: Arc::clone(&running),
            app_id: AppId::new("a"),
        });
        assert!(running.lock().is_empty());
    }
}
