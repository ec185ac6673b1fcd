//! Fake agent sessions.

use tokio::sync::mpsc;

use crate::application::session::ClusterSessionRegistry;
use crate::domain::command::AgentCommand;
use crate::domain::id::{ClusterId, SessionId};

/// Register a session and return the receiving end of its command queue.
pub fn connect(
    registry: &ClusterSessionRegistry,
    session: &str,
    cluster: &str,
) -> mpsc::Receiver<AgentCommand> {
    let (tx, rx) = mpsc::channel(64);
    registry.on_connect(SessionId::new(session), ClusterId::new(cluster), tx);
    rx
}

/// Every command queued so far.
pub fn drain(rx: &mut mpsc::Receiver<AgentCommand>) -> Vec<AgentCommand> {
    let mut commands = Vec::new();
    while let Ok(command) = rx.try_recv() {
        commands.push(command);
    }
    commands
}
