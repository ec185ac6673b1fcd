//! Backup and restore objects consumed during disaster recovery.
//!
//! Backups record which sequence each app was running when they were taken.
//! Single-app backups carry one sequence annotation; instance backups span
//! several apps and carry a JSON map keyed by app slug.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Sequence of the app in a single-app backup.
pub const APP_SEQUENCE_ANNOTATION: &str = "harbormaster.io/app-sequence";
/// Slug of the app in a single-app backup.
pub const APP_SLUG_ANNOTATION: &str = "harbormaster.io/app-slug";
/// Marks a backup that spans infrastructure plus one or more apps.
pub const INSTANCE_BACKUP_ANNOTATION: &str = "harbormaster.io/instance-backup";
/// JSON map of app slug to sequence in an instance backup.
pub const APPS_SEQUENCES_ANNOTATION: &str = "harbormaster.io/apps-sequences";
/// Label carried by every resource of an app, used to scope restores.
pub const APP_SLUG_LABEL: &str = "harbormaster.io/app-slug";

/// Errors reading a backup's sequence annotations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackupError {
    #[error("backup {backup} has no sequence annotation for app {slug}")]
    MissingSequence { backup: String, slug: String },

    #[error("backup {backup} has a malformed sequence annotation: {reason}")]
    MalformedSequence { backup: String, reason: String },
}

/// A completed backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    pub name: String,
    /// Namespaces the backup captured.
    pub included_namespaces: Vec<String>,
    pub annotations: HashMap<String, String>,
}

impl Backup {
    /// True when the backup spans more than a single app.
    #[must_use]
    pub fn is_instance_backup(&self) -> bool {
        self.annotations
            .get(INSTANCE_BACKUP_ANNOTATION)
            .is_some_and(|v| v == "true")
    }

    /// Deterministic restore name for `app_slug`.
    #[must_use]
    pub fn restore_name(&self, app_slug: &str) -> String {
        if self.is_instance_backup() {
            format!("{}.{}", self.name, app_slug)
        } else {
            self.name.clone()
        }
    }

    /// Label selector scoping an instance restore to one app.
    #[must_use]
    pub fn restore_selector(&self, app_slug: &str) -> Option<LabelSelector> {
        self.is_instance_backup().then(|| LabelSelector {
            key: APP_SLUG_LABEL.to_string(),
            value: app_slug.to_string(),
        })
    }

    /// Sequence `app_slug` was running when the backup was taken.
    pub fn sequence_for(&self, app_slug: &str) -> Result<u64, BackupError> {
        let missing = || BackupError::MissingSequence {
            backup: self.name.clone(),
            slug: app_slug.to_string(),
        };
        let malformed = |reason: String| BackupError::MalformedSequence {
            backup: self.name.clone(),
            reason,
        };

        if self.is_instance_backup() {
            let raw = self
                .annotations
                .get(APPS_SEQUENCES_ANNOTATION)
                .ok_or_else(missing)?;
            let map: HashMap<String, u64> =
                serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
            return map.get(app_slug).copied().ok_or_else(missing);
        }

        if let Some(slug) = self.annotations.get(APP_SLUG_ANNOTATION) {
            if slug != app_slug {
                return Err(missing());
            }
        }
        let raw = self
            .annotations
            .get(APP_SEQUENCE_ANNOTATION)
            .ok_or_else(missing)?;
        raw.trim()
            .parse::<u64>()
            .map_err(|e| malformed(format!("{raw:?}: {e}")))
    }
}

/// `key=value` equality selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Phase reported by a restore object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestorePhase {
    #[default]
    New,
    InProgress,
    Completed,
    PartiallyFailed,
    Failed,
    FailedValidation,
}

impl RestorePhase {
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(
            self,
            Self::PartiallyFailed | Self::Failed | Self::FailedValidation
        )
    }
}

/// A restore object created from a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restore {
    pub name: String,
    pub backup_name: String,
    pub selector: Option<LabelSelector>,
    pub phase: RestorePhase,
}
