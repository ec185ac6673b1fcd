//! Upstream release service port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::app::App;
use crate::domain::update::{DownloadedUpdate, PendingUpdate};
use crate::error::Result;

/// Where an update check starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateQuery {
    /// Cursor of the newest persisted release.
    pub current_cursor: Option<String>,
    pub channel_id: String,
    /// Last successful check; updates published before it are skipped.
    pub since: Option<DateTime<Utc>>,
}

/// Client for the service that publishes releases and licenses.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Sync the app's license. A changed license yields an update to persist.
    async fn sync_license(&self, app: &App) -> Result<Option<PendingUpdate>>;

    /// Updates newer than the query's cursor, oldest first.
    async fn fetch_updates(&self, app: &App, query: &UpdateQuery) -> Result<Vec<PendingUpdate>>;

    /// Download the release archive for an update.
    async fn download_update(&self, app: &App, update: &PendingUpdate)
        -> Result<DownloadedUpdate>;
}
