//! Scripted and recording collaborators.
//!
//! - [`ScriptedUpstream`]: serves a fixed license result and update batch,
//!   with per-cursor download failures and an optional gate that holds
//!   `fetch_updates` open
//! - [`FailingRenderer`]: delegates to another renderer but fails chosen sequences
//! - [`RecordingSupportBundles`]: remembers which apps were collected
//! - [`RecordingResultHandler`]: remembers every agent message

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::app::App;
use crate::domain::command::AgentMessage;
use crate::domain::id::{AppId, ClusterId};
use crate::domain::update::{DownloadedUpdate, PendingUpdate};
use crate::error::{Error, Result};
use crate::port::inbound::callback::ResultHandler;
use crate::port::outbound::render::{ManifestRenderer, RenderedRelease};
use crate::port::outbound::support_bundle::SupportBundleCollector;
use crate::port::outbound::upstream::{UpdateQuery, UpstreamClient};

// ---------------------------------------------------------------------------
// ScriptedUpstream
// ---------------------------------------------------------------------------

/// Upstream that returns pre-loaded updates.
#[derive(Default)]
pub struct ScriptedUpstream {
    license_results: Mutex<VecDeque<Option<PendingUpdate>>>,
    updates: Mutex<Vec<PendingUpdate>>,
    failing_downloads: Mutex<HashSet<String>>,
    queries: Mutex<Vec<UpdateQuery>>,
    fetch_count: AtomicU32,
    gate: Option<Arc<Notify>>,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates returned by every `fetch_updates` call.
    pub fn with_updates(self, updates: Vec<PendingUpdate>) -> Self {
        *self.updates.lock() = updates;
        self
    }

    /// Results of successive `sync_license` calls; `None` once exhausted.
    pub fn with_license_results(self, results: Vec<Option<PendingUpdate>>) -> Self {
        *self.license_results.lock() = results.into();
        self
    }

    /// Make downloading `cursor` fail.
    pub fn failing_download(self, cursor: &str) -> Self {
        self.failing_downloads.lock().insert(cursor.to_string());
        self
    }

    /// Block `fetch_updates` until the gate is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<UpdateQuery> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn sync_license(&self, _app: &App) -> Result<Option<PendingUpdate>> {
        Ok(self.license_results.lock().pop_front().flatten())
    }

    async fn fetch_updates(&self, _app: &App, query: &UpdateQuery) -> Result<Vec<PendingUpdate>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.updates.lock().clone())
    }

    async fn download_update(
        &self,
        _app: &App,
        update: &PendingUpdate,
    ) -> Result<DownloadedUpdate> {
        if self.failing_downloads.lock().contains(&update.cursor) {
            return Err(Error::Upstream(format!("download of {} failed", update.cursor)));
        }
        Ok(DownloadedUpdate {
            update: update.clone(),
            archive: format!("# release {}\n", update.cursor).into_bytes(),
            needs_config: false,
            has_preflight: false,
        })
    }
}

// ---------------------------------------------------------------------------
// FailingRenderer
// ---------------------------------------------------------------------------

/// Renderer that fails for chosen sequences and delegates otherwise.
pub struct FailingRenderer {
    inner: Arc<dyn ManifestRenderer>,
    failing: Mutex<HashSet<u64>>,
    attempts: AtomicU32,
}

impl FailingRenderer {
    pub fn new(inner: Arc<dyn ManifestRenderer>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn fail_sequence(&self, sequence: u64) {
        self.failing.lock().insert(sequence);
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestRenderer for FailingRenderer {
    async fn render(&self, app: &App, sequence: u64) -> Result<RenderedRelease> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(&sequence) {
            return Err(Error::Render(format!("template error in sequence {sequence}")));
        }
        self.inner.render(app, sequence).await
    }
}

// ---------------------------------------------------------------------------
// Recorders
// ---------------------------------------------------------------------------

/// Support-bundle collector that records requests.
#[derive(Default)]
pub struct RecordingSupportBundles {
    collected: Mutex<Vec<AppId>>,
    fail: bool,
}

impl RecordingSupportBundles {
    /// Collector whose every call fails after recording.
    pub fn failing() -> Self {
        Self {
            collected: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn collected(&self) -> Vec<AppId> {
        self.collected.lock().clone()
    }
}

#[async_trait]
impl SupportBundleCollector for RecordingSupportBundles {
    async fn collect(&self, app: &App) -> Result<()> {
        self.collected.lock().push(app.id.clone());
        if self.fail {
            return Err(Error::Snapshot("collector unavailable".into()));
        }
        Ok(())
    }
}

/// Result handler that records every message.
#[derive(Default)]
pub struct RecordingResultHandler {
    messages: Mutex<Vec<(ClusterId, AgentMessage)>>,
    notify: Notify,
}

impl RecordingResultHandler {
    pub fn messages(&self) -> Vec<(ClusterId, AgentMessage)> {
        self.messages.lock().clone()
    }

    /// Wait until at least one more message has been recorded.
    pub async fn recorded(&self) {
        self.notify.notified().await;
    }
}

#[async_trait]
impl ResultHandler for RecordingResultHandler {
    async fn handle(&self, cluster_id: &ClusterId, message: AgentMessage) -> Result<()> {
        self.messages.lock().push((cluster_id.clone(), message));
        self.notify.notify_one();
        Ok(())
    }
}
