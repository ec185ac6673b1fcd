//! Background task status surfaced to users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::AppId;

/// Identifier of the update-download task for an app.
#[must_use]
pub fn update_download_task(app_id: &AppId) -> String {
    format!("update-download:{app_id}")
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Failed { retryable: bool },
}

/// Latest recorded status of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl TaskStatus {
    pub fn running(message: impl Into<String>) -> Self {
        Self {
            state: TaskState::Running,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }

    pub fn failed(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            state: TaskState::Failed { retryable },
            message: message.into(),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }
}
