//! Disaster-recovery restore state machine.
//!
//! ```text
//! None ──Requested──► UndeployRequested ──UndeployDispatched──► UndeployInProgress
//!   └────────────UndeployDispatched──────────────────────────────────┘  │
//!                                               UndeployCompleted ◄─────┤ (callback)
//!                                                      │                └─UndeployFailed─► RestoreFailed
//!                        RestoreCreated ◄─RestoreCreated┤
//!                              │ PollStarted            │ PollStarted
//!                              ▼                        ▼
//!                        RestorePolling ──RestoreCompleted──► RedeployTriggered ──Cleared──► None
//!                              └────────RestoreFailed───────► RestoreFailed ─────Cleared──► None
//! ```
//!
//! Two side edges: `UndeployInProgress ──UndeployUnsent──► UndeployRequested`
//! and `None | UndeployRequested ──BackupMissing──► RestoreFailed`.
//!
//! `UndeployInProgress` is written before the undeploy goes out, so a result
//! posted by a fast agent always finds the app waiting for it. A send that
//! fails takes the app back to `UndeployRequested` for the next tick.
//!
//! Only the pairs listed in [`RestoreState::transition`] are legal; anything
//! else yields `None` so callers can log and ignore it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-app restore progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreState {
    #[default]
    None,
    UndeployRequested,
    UndeployInProgress,
    UndeployCompleted,
    RestoreCreated,
    RestorePolling,
    RedeployTriggered,
    RestoreFailed,
}

/// Something that happened to an app's restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestoreEvent {
    /// Operator asked to restore the app from a backup.
    Requested,
    /// Undeploy command is about to be sent to the agents.
    UndeployDispatched,
    /// Sending the undeploy failed; it is retried on the next tick.
    UndeployUnsent,
    /// The backup named by the restore flag does not exist.
    BackupMissing,
    /// Agent reported a successful undeploy.
    UndeployCompleted,
    /// Agent reported a failed undeploy.
    UndeployFailed,
    /// Restore object was created.
    RestoreCreated,
    /// Restore object exists and is being watched.
    PollStarted,
    /// Restore finished successfully and the release was redeployed.
    RestoreCompleted,
    /// Restore finished with a failed or partially failed phase.
    RestoreFailed,
    /// Restore flag cleared.
    Cleared,
}

impl RestoreState {
    /// Next state for `event`, or `None` when the pair is not in the table.
    #[must_use]
    pub const fn transition(self, event: RestoreEvent) -> Option<Self> {
        use RestoreEvent as E;
        use RestoreState as S;

        match (self, event) {
            (S::None, E::Requested) => Some(S::UndeployRequested),
            (S::None | S::UndeployRequested, E::UndeployDispatched) => {
                Some(S::UndeployInProgress)
            }
            (S::None | S::UndeployRequested, E::BackupMissing) => Some(S::RestoreFailed),
            (S::UndeployInProgress, E::UndeployUnsent) => Some(S::UndeployRequested),
            (S::UndeployInProgress, E::UndeployCompleted) => Some(S::UndeployCompleted),
            (S::UndeployInProgress, E::UndeployFailed) => Some(S::RestoreFailed),
            (S::UndeployCompleted, E::RestoreCreated) => Some(S::RestoreCreated),
            (S::UndeployCompleted | S::RestoreCreated, E::PollStarted) => {
                Some(S::RestorePolling)
            }
            (S::UndeployCompleted | S::RestoreCreated | S::RestorePolling, E::RestoreCompleted) => {
                Some(S::RedeployTriggered)
            }
            (S::UndeployCompleted | S::RestoreCreated | S::RestorePolling, E::RestoreFailed) => {
                Some(S::RestoreFailed)
            }
            (S::RedeployTriggered | S::RestoreFailed, E::Cleared) => Some(S::None),
            _ => None,
        }
    }

    /// True before the undeploy command has gone out.
    #[must_use]
    pub const fn awaiting_undeploy(self) -> bool {
        matches!(self, Self::None | Self::UndeployRequested)
    }

    /// True once the undeploy finished and the restore object is being handled.
    #[must_use]
    pub const fn restoring(self) -> bool {
        matches!(
            self,
            Self::UndeployCompleted | Self::RestoreCreated | Self::RestorePolling
        )
    }

    /// True for the two terminal states that only wait to be cleared.
    #[must_use]
    pub const fn finished(self) -> bool {
        matches!(self, Self::RedeployTriggered | Self::RestoreFailed)
    }
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::UndeployRequested => "undeploy_requested",
            Self::UndeployInProgress => "undeploy_in_progress",
            Self::UndeployCompleted => "undeploy_completed",
            Self::RestoreCreated => "restore_created",
            Self::RestorePolling => "restore_polling",
            Self::RedeployTriggered => "redeploy_triggered",
            Self::RestoreFailed => "restore_failed",
        };
        f.write_str(s)
    }
}
