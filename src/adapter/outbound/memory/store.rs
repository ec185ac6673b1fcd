//! In-memory store implementation.
//!
//! Backs the standalone runtime (seeded from config) and the tests. Sequences
//! are allocated per app and shared by every cluster the app runs on; release
//! status is tracked per cluster.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::app::App;
use crate::domain::id::{AppId, ClusterId};
use crate::domain::release::{Release, ReleaseCatalog, ReleaseStatus};
use crate::domain::restore::RestoreState;
use crate::domain::task::TaskStatus;
use crate::domain::update::DownloadedUpdate;
use crate::error::{Error, Result};
use crate::port::outbound::render::{ManifestRenderer, RenderedRelease};
use crate::port::outbound::store::{AppStore, ReleaseStore, TaskStore};

#[derive(Debug, Clone)]
struct StoredRelease {
    sequence: u64,
    cursor: String,
    label: String,
    channel_id: String,
    archive: Vec<u8>,
    initial_status: ReleaseStatus,
    statuses: HashMap<ClusterId, (ReleaseStatus, Option<String>)>,
}

impl StoredRelease {
    fn status_on(&self, cluster_id: &ClusterId) -> ReleaseStatus {
        self.statuses
            .get(cluster_id)
            .map_or(self.initial_status, |(status, _)| *status)
    }

    fn view(&self, cluster_id: &ClusterId) -> Release {
        Release {
            sequence: self.sequence,
            cursor: self.cursor.clone(),
            label: self.label.clone(),
            channel_id: self.channel_id.clone(),
            status: self.status_on(cluster_id),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Deployment {
    desired: Option<u64>,
    ready: bool,
}

#[derive(Debug, Default)]
struct State {
    apps: BTreeMap<AppId, App>,
    deployments: BTreeMap<(AppId, ClusterId), Deployment>,
    releases: HashMap<AppId, Vec<StoredRelease>>,
    rollback_allowed: HashMap<AppId, bool>,
    informers: HashMap<AppId, Vec<String>>,
    last_checks: HashMap<AppId, DateTime<Utc>>,
    tasks: HashMap<String, TaskStatus>,
    failing_cursors: Vec<String>,
    restore_history: HashMap<AppId, Vec<RestoreState>>,
}

/// In-memory store for apps, releases and task status.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an app record.
    pub fn insert_app(&self, app: App) {
        self.state.write().apps.insert(app.id.clone(), app);
    }

    /// Record that `app_id` runs on `cluster_id`.
    pub fn assign_cluster(&self, app_id: &AppId, cluster_id: ClusterId) {
        self.state
            .write()
            .deployments
            .entry((app_id.clone(), cluster_id))
            .or_default();
    }

    /// Insert a release. Its status applies to every cluster until overridden.
    pub fn insert_release(&self, app_id: &AppId, release: Release) {
        let mut state = self.state.write();
        let releases = state.releases.entry(app_id.clone()).or_default();
        releases.retain(|r| r.sequence != release.sequence);
        releases.push(StoredRelease {
            sequence: release.sequence,
            archive: format!("# {} sequence {}\n", app_id, release.sequence).into_bytes(),
            cursor: release.cursor,
            label: release.label,
            channel_id: release.channel_id,
            initial_status: release.status,
            statuses: HashMap::new(),
        });
    }

    /// Set the desired sequence directly, bypassing the decision engine.
    pub fn set_desired(&self, app_id: &AppId, cluster_id: &ClusterId, sequence: u64) {
        self.state
            .write()
            .deployments
            .entry((app_id.clone(), cluster_id.clone()))
            .or_default()
            .desired = Some(sequence);
    }

    pub fn set_rollback_allowed(&self, app_id: &AppId, allowed: bool) {
        self.state
            .write()
            .rollback_allowed
            .insert(app_id.clone(), allowed);
    }

    /// Informers reported for every release of the app.
    pub fn set_informers(&self, app_id: &AppId, informers: Vec<String>) {
        self.state.write().informers.insert(app_id.clone(), informers);
    }

    /// Make persisting the update with `cursor` fail.
    pub fn fail_create_for_cursor(&self, cursor: impl Into<String>) {
        self.state.write().failing_cursors.push(cursor.into());
    }

    /// Start a restore from `backup`.
    pub fn request_restore(&self, app_id: &AppId, backup: impl Into<String>) -> bool {
        match self.state.write().apps.get_mut(app_id) {
            Some(app) => {
                app.restore_in_progress = Some(backup.into());
                true
            }
            None => false,
        }
    }

    /// Every restore state written for the app, oldest first.
    #[must_use]
    pub fn restore_history(&self, app_id: &AppId) -> Vec<RestoreState> {
        self.state
            .read()
            .restore_history
            .get(app_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn app(&self, app_id: &AppId) -> Option<App> {
        self.state.read().apps.get(app_id).cloned()
    }

    #[must_use]
    pub fn desired(&self, app_id: &AppId, cluster_id: &ClusterId) -> Option<u64> {
        self.state
            .read()
            .deployments
            .get(&(app_id.clone(), cluster_id.clone()))
            .and_then(|d| d.desired)
    }

    /// Status and message recorded for a release on a cluster.
    #[must_use]
    pub fn release_status(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
        sequence: u64,
    ) -> Option<(ReleaseStatus, Option<String>)> {
        let state = self.state.read();
        let release = state
            .releases
            .get(app_id)?
            .iter()
            .find(|r| r.sequence == sequence)?;
        Some(
            release
                .statuses
                .get(cluster_id)
                .cloned()
                .unwrap_or((release.initial_status, None)),
        )
    }

    #[must_use]
    pub fn is_ready(&self, app_id: &AppId, cluster_id: &ClusterId) -> bool {
        self.state
            .read()
            .deployments
            .get(&(app_id.clone(), cluster_id.clone()))
            .is_some_and(|d| d.ready)
    }

    /// Sequence persisted for `cursor`, if any.
    #[must_use]
    pub fn sequence_for_cursor(&self, app_id: &AppId, cursor: &str) -> Option<u64> {
        self.state
            .read()
            .releases
            .get(app_id)?
            .iter()
            .find(|r| r.cursor == cursor)
            .map(|r| r.sequence)
    }

    fn with_app<T>(&self, app_id: &AppId, f: impl FnOnce(&mut App) -> T) -> Result<T> {
        let mut state = self.state.write();
        let app = state
            .apps
            .get_mut(app_id)
            .ok_or_else(|| Error::Store(format!("app {app_id} not found")))?;
        Ok(f(app))
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn list_apps(&self) -> Result<Vec<App>> {
        Ok(self.state.read().apps.values().cloned().collect())
    }

    async fn get_app(&self, app_id: &AppId) -> Result<Option<App>> {
        Ok(self.state.read().apps.get(app_id).cloned())
    }

    async fn list_apps_for_cluster(&self, cluster_id: &ClusterId) -> Result<Vec<App>> {
        let state = self.state.read();
        Ok(state
            .deployments
            .keys()
            .filter(|(_, c)| c == cluster_id)
            .filter_map(|(app_id, _)| state.apps.get(app_id).cloned())
            .collect())
    }

    async fn list_clusters_for_app(&self, app_id: &AppId) -> Result<Vec<ClusterId>> {
        Ok(self
            .state
            .read()
            .deployments
            .keys()
            .filter(|(a, _)| a == app_id)
            .map(|(_, cluster_id)| cluster_id.clone())
            .collect())
    }

    async fn set_restore_state(&self, app_id: &AppId, restore: RestoreState) -> Result<()> {
        let mut state = self.state.write();
        let app = state
            .apps
            .get_mut(app_id)
            .ok_or_else(|| Error::Store(format!("app {app_id} not found")))?;
        app.restore_state = restore;
        state
            .restore_history
            .entry(app_id.clone())
            .or_default()
            .push(restore);
        Ok(())
    }

    async fn clear_restore(&self, app_id: &AppId) -> Result<()> {
        self.with_app(app_id, |app| {
            app.restore_in_progress = None;
            app.restore_state = RestoreState::None;
        })
    }

    async fn set_app_status_ready(&self, app_id: &AppId, cluster_id: &ClusterId) -> Result<()> {
        self.state
            .write()
            .deployments
            .entry((app_id.clone(), cluster_id.clone()))
            .or_default()
            .ready = true;
        Ok(())
    }

    async fn last_update_check(&self, app_id: &AppId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.read().last_checks.get(app_id).copied())
    }

    async fn set_last_update_check(&self, app_id: &AppId, at: DateTime<Utc>) -> Result<()> {
        self.state.write().last_checks.insert(app_id.clone(), at);
        Ok(())
    }
}

#[async_trait]
impl ReleaseStore for MemoryStore {
    async fn get_release_catalog(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
    ) -> Result<ReleaseCatalog> {
        let state = self.state.read();
        let releases = state
            .releases
            .get(app_id)
            .map(|releases| releases.iter().map(|r| r.view(cluster_id)).collect())
            .unwrap_or_default();
        let current = state
            .deployments
            .get(&(app_id.clone(), cluster_id.clone()))
            .and_then(|d| d.desired);
        Ok(ReleaseCatalog::new(
            app_id.clone(),
            cluster_id.clone(),
            releases,
            current,
        ))
    }

    async fn get_desired_sequence(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
    ) -> Result<Option<u64>> {
        Ok(self.desired(app_id, cluster_id))
    }

    async fn set_desired_sequence(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
        sequence: u64,
    ) -> Result<()> {
        self.set_desired(app_id, cluster_id, sequence);
        Ok(())
    }

    async fn create_release(&self, app_id: &AppId, update: &DownloadedUpdate) -> Result<u64> {
        let mut state = self.state.write();
        if state.failing_cursors.contains(&update.update.cursor) {
            return Err(Error::Store(format!(
                "failed to persist release for cursor {}",
                update.update.cursor
            )));
        }

        let releases = state.releases.entry(app_id.clone()).or_default();
        let sequence = releases.iter().map(|r| r.sequence + 1).max().unwrap_or(0);
        let initial_status = if update.needs_config {
            ReleaseStatus::PendingConfig
        } else if update.has_preflight {
            ReleaseStatus::PendingPreflight
        } else {
            ReleaseStatus::Pending
        };
        releases.push(StoredRelease {
            sequence,
            cursor: update.update.cursor.clone(),
            label: update.update.version_label.clone(),
            channel_id: update.update.channel_id.clone(),
            archive: update.archive.clone(),
            initial_status,
            statuses: HashMap::new(),
        });
        Ok(sequence)
    }

    async fn set_release_status(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
        sequence: u64,
        status: ReleaseStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let release = state
            .releases
            .get_mut(app_id)
            .and_then(|releases| releases.iter_mut().find(|r| r.sequence == sequence))
            .ok_or_else(|| Error::Store(format!("release {app_id}/{sequence} not found")))?;
        release
            .statuses
            .insert(cluster_id.clone(), (status, message.map(str::to_string)));
        Ok(())
    }

    async fn is_rollback_allowed(&self, app_id: &AppId, _sequence: u64) -> Result<bool> {
        Ok(self
            .state
            .read()
            .rollback_allowed
            .get(app_id)
            .copied()
            .unwrap_or(false))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_task_status(&self, task_id: &str) -> Result<Option<TaskStatus>> {
        Ok(self.state.read().tasks.get(task_id).cloned())
    }

    async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.state.write().tasks.insert(task_id.to_string(), status);
        Ok(())
    }

    async fn clear_task_status(&self, task_id: &str) -> Result<()> {
        self.state.write().tasks.remove(task_id);
        Ok(())
    }
}

/// Serves the stored release archive as the rendered manifests.
#[async_trait]
impl ManifestRenderer for MemoryStore {
    async fn render(&self, app: &App, sequence: u64) -> Result<RenderedRelease> {
        let state = self.state.read();
        let release = state
            .releases
            .get(&app.id)
            .and_then(|releases| releases.iter().find(|r| r.sequence == sequence))
            .ok_or_else(|| Error::Render(format!("no archive for {}/{sequence}", app.id)))?;
        Ok(RenderedRelease {
            manifests: release.archive.clone(),
            informers: state.informers.get(&app.id).cloned().unwrap_or_default(),
            wait: true,
            ..RenderedRelease::default()
        })
    }
}
