//! Builders for domain primitives used across tests.
//!
//! Catalogs built here always belong to app [`APP`] on cluster [`CLUSTER`].

use std::collections::HashMap;

use crate::domain::app::App;
use crate::domain::backup::{
    Backup, APPS_SEQUENCES_ANNOTATION, APP_SEQUENCE_ANNOTATION, APP_SLUG_ANNOTATION,
    INSTANCE_BACKUP_ANNOTATION,
};
use crate::domain::id::{AppId, ClusterId};
use crate::domain::release::{Release, ReleaseCatalog, ReleaseStatus};
use crate::domain::update::PendingUpdate;

pub const APP: &str = "app";
pub const CLUSTER: &str = "cluster-1";
pub const CHANNEL: &str = "stable";

/// A pending release on [`CHANNEL`].
pub fn release(sequence: u64, cursor: &str, label: &str) -> Release {
    Release {
        sequence,
        cursor: cursor.to_string(),
        label: label.to_string(),
        channel_id: CHANNEL.to_string(),
        status: ReleaseStatus::Pending,
    }
}

/// A release whose cursor is its sequence and whose label is a version.
pub fn semver_release(sequence: u64, label: &str) -> Release {
    release(sequence, &sequence.to_string(), label)
}

/// Catalog for [`APP`] on [`CLUSTER`].
pub fn catalog(releases: Vec<Release>, current: Option<u64>) -> ReleaseCatalog {
    ReleaseCatalog::new(AppId::new(APP), ClusterId::new(CLUSTER), releases, current)
}

/// App whose slug equals its ID, on [`CHANNEL`].
pub fn app(id: &str) -> App {
    App::new(id, id, CHANNEL)
}

pub fn pending_update(cursor: &str, label: &str) -> PendingUpdate {
    PendingUpdate {
        cursor: cursor.to_string(),
        version_label: label.to_string(),
        channel_id: CHANNEL.to_string(),
        is_required: false,
    }
}

/// Backup of a single app taken at `sequence`.
pub fn single_app_backup(name: &str, slug: &str, sequence: u64, namespaces: &[&str]) -> Backup {
    Backup {
        name: name.to_string(),
        included_namespaces: namespaces.iter().map(|n| (*n).to_string()).collect(),
        annotations: HashMap::from([
            (APP_SEQUENCE_ANNOTATION.to_string(), sequence.to_string()),
            (APP_SLUG_ANNOTATION.to_string(), slug.to_string()),
        ]),
    }
}

/// Instance backup covering several apps.
pub fn instance_backup(name: &str, sequences: &[(&str, u64)], namespaces: &[&str]) -> Backup {
    let map: HashMap<&str, u64> = sequences.iter().copied().collect();
    Backup {
        name: name.to_string(),
        included_namespaces: namespaces.iter().map(|n| (*n).to_string()).collect(),
        annotations: HashMap::from([
            (INSTANCE_BACKUP_ANNOTATION.to_string(), "true".to_string()),
            (
                APPS_SEQUENCES_ANNOTATION.to_string(),
                serde_json::to_string(&map).unwrap_or_default(),
            ),
        ]),
    }
}
