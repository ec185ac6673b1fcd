//! Registry of live downstream agent sessions.
//!
//! One exclusive lock guards the session list together with each session's
//! dispatch memory. No method calls back into the registry or performs I/O
//! while holding it: callers take a [`SessionSnapshot`], release the lock,
//! then act.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::command::AgentCommand;
use crate::domain::id::{AppId, ClusterId, SessionId};
use crate::error::{Error, Result};

/// Outbound command queue of one session.
pub type CommandSender = mpsc::Sender<AgentCommand>;

/// One live agent connection.
#[derive(Debug)]
struct ClusterSession {
    session_id: SessionId,
    cluster_id: ClusterId,
    sender: CommandSender,
    sent_preflight_urls: HashSet<String>,
    last_dispatched: HashMap<AppId, u64>,
}

/// Copy of a session's routing data, safe to use after the lock is released.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub cluster_id: ClusterId,
    sender: CommandSender,
}

impl SessionSnapshot {
    /// Queue a command on the session's channel.
    pub async fn send(&self, command: AgentCommand) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed(self.session_id.clone()))
    }
}

/// All connected sessions, deduplicated by session ID only.
#[derive(Debug, Default)]
pub struct ClusterSessionRegistry {
    sessions: Mutex<Vec<ClusterSession>>,
}

impl ClusterSessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. Re-registering a session ID replaces it.
    pub fn on_connect(&self, session_id: SessionId, cluster_id: ClusterId, sender: CommandSender) {
        let mut sessions = self.sessions.lock();
        sessions.retain(|s| s.session_id != session_id);
        info!(session = %session_id, cluster = %cluster_id, active = sessions.len() + 1, "Agent session connected");
        sessions.push(ClusterSession {
            session_id,
            cluster_id,
            sender,
            sent_preflight_urls: HashSet::new(),
            last_dispatched: HashMap::new(),
        });
    }

    /// Remove a session. Returns its cluster when it was registered.
    pub fn on_disconnect(&self, session_id: &SessionId) -> Option<ClusterId> {
        let mut sessions = self.sessions.lock();
        let index = sessions.iter().position(|s| &s.session_id == session_id)?;
        let removed = sessions.swap_remove(index);
        info!(session = %session_id, cluster = %removed.cluster_id, active = sessions.len(), "Agent session disconnected");
        Some(removed.cluster_id)
    }

    /// Snapshot of every active session.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .lock()
            .iter()
            .map(|s| SessionSnapshot {
                session_id: s.session_id.clone(),
                cluster_id: s.cluster_id.clone(),
                sender: s.sender.clone(),
            })
            .collect()
    }

    /// Snapshot of the sessions connected for one cluster.
    #[must_use]
    pub fn sessions_for_cluster(&self, cluster_id: &ClusterId) -> Vec<SessionSnapshot> {
        self.snapshot()
            .into_iter()
            .filter(|s| &s.cluster_id == cluster_id)
            .collect()
    }

    /// Call `f` for every active session. The lock is not held during `f`.
    pub fn for_each_active_session(&self, mut f: impl FnMut(&SessionSnapshot)) {
        for session in self.snapshot() {
            f(&session);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Sequence last dispatched for `app_id` on the session.
    #[must_use]
    pub fn last_dispatched(&self, session_id: &SessionId, app_id: &AppId) -> Option<u64> {
        self.sessions
            .lock()
            .iter()
            .find(|s| &s.session_id == session_id)
            .and_then(|s| s.last_dispatched.get(app_id).copied())
    }

    /// Remember a completed dispatch. Returns false when the session is gone.
    pub fn record_dispatch(&self, session_id: &SessionId, app_id: &AppId, sequence: u64) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.iter_mut().find(|s| &s.session_id == session_id) {
            Some(session) => {
                session.last_dispatched.insert(app_id.clone(), sequence);
                true
            }
            None => false,
        }
    }

    /// Forget what was dispatched for `app_id` on every session.
    pub fn clear_dispatched(&self, app_id: &AppId) {
        let mut sessions = self.sessions.lock();
        for session in sessions.iter_mut() {
            session.last_dispatched.remove(app_id);
        }
        debug!(app = %app_id, "Cleared dispatched sequences");
    }

    /// Mark a preflight URL sent. Returns true the first time for a session.
    pub fn mark_preflight_sent(&self, session_id: &SessionId, url: &str) -> bool {
        let mut sessions = self.sessions.lock();
        sessions
            .iter_mut()
            .find(|s| &s.session_id == session_id)
            .is_some_and(|s| s.sent_preflight_urls.insert(url.to_string()))
    }
}
