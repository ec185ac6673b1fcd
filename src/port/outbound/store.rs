//! Persistence ports for apps, releases and task status.
//!
//! The relational schema lives behind these traits; the control plane only
//! reads catalogs and writes desired sequences, statuses and restore state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::app::App;
use crate::domain::id::{AppId, ClusterId};
use crate::domain::release::{ReleaseCatalog, ReleaseStatus};
use crate::domain::restore::RestoreState;
use crate::domain::task::TaskStatus;
use crate::domain::update::DownloadedUpdate;
use crate::error::Result;

/// Storage operations for app records.
#[async_trait]
pub trait AppStore: Send + Sync {
    /// List every managed app.
    async fn list_apps(&self) -> Result<Vec<App>>;

    /// Get an app by ID.
    async fn get_app(&self, app_id: &AppId) -> Result<Option<App>>;

    /// Apps deployed to a cluster.
    async fn list_apps_for_cluster(&self, cluster_id: &ClusterId) -> Result<Vec<App>>;

    /// Clusters an app is deployed to.
    async fn list_clusters_for_app(&self, app_id: &AppId) -> Result<Vec<ClusterId>>;

    /// Persist a restore state transition.
    async fn set_restore_state(&self, app_id: &AppId, state: RestoreState) -> Result<()>;

    /// Clear the restore flag and reset the state machine to `None`.
    async fn clear_restore(&self, app_id: &AppId) -> Result<()>;

    /// Mark the app ready on a cluster when no informers report for it.
    async fn set_app_status_ready(&self, app_id: &AppId, cluster_id: &ClusterId) -> Result<()>;

    /// When the upstream was last checked successfully.
    async fn last_update_check(&self, app_id: &AppId) -> Result<Option<DateTime<Utc>>>;

    /// Record a successful upstream check.
    async fn set_last_update_check(&self, app_id: &AppId, at: DateTime<Utc>) -> Result<()>;
}

/// Storage operations for releases and desired sequences.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Releases known for one (app, cluster) pair.
    async fn get_release_catalog(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
    ) -> Result<ReleaseCatalog>;

    /// Sequence the control plane wants the cluster to run.
    async fn get_desired_sequence(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
    ) -> Result<Option<u64>>;

    /// Mark `sequence` desired for the cluster.
    async fn set_desired_sequence(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
        sequence: u64,
    ) -> Result<()>;

    /// Persist a downloaded update as a new release. Returns its sequence.
    async fn create_release(&self, app_id: &AppId, update: &DownloadedUpdate) -> Result<u64>;

    /// Record the status of a release on a cluster.
    async fn set_release_status(
        &self,
        app_id: &AppId,
        cluster_id: &ClusterId,
        sequence: u64,
        status: ReleaseStatus,
        message: Option<&str>,
    ) -> Result<()>;

    /// Whether the app's channel allows rolling back to `sequence`.
    async fn is_rollback_allowed(&self, app_id: &AppId, sequence: u64) -> Result<bool>;
}

/// Storage operations for user-visible task status.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task_status(&self, task_id: &str) -> Result<Option<TaskStatus>>;

    async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()>;

    async fn clear_task_status(&self, task_id: &str) -> Result<()>;
}

/// Everything the control plane needs from persistence.
pub trait Store: AppStore + ReleaseStore + TaskStore {}

impl<T: AppStore + ReleaseStore + TaskStore + ?Sized> Store for T {}
