//! Persisted releases and the per-(app, cluster) catalog view.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{AppId, ClusterId};
use super::version::VersionOrdinal;

/// Deployment status of one release on one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    PendingDownload,
    PendingConfig,
    PendingPreflight,
    Pending,
    Deploying,
    Deployed,
    Failed,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PendingDownload => "pending_download",
            Self::PendingConfig => "pending_config",
            Self::PendingPreflight => "pending_preflight",
            Self::Pending => "pending",
            Self::Deploying => "deploying",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One persisted release of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Monotonic sequence, unique per (app, cluster).
    pub sequence: u64,
    /// Upstream update cursor this release was built from.
    pub cursor: String,
    /// Human-facing version label, semver on semver-enabled channels.
    pub label: String,
    /// Channel the release was published on.
    pub channel_id: String,
    /// Status on the cluster the catalog was read for.
    pub status: ReleaseStatus,
}

impl Release {
    /// Ordinal of the update cursor, if it parses.
    #[must_use]
    pub fn cursor_ordinal(&self) -> Option<VersionOrdinal> {
        VersionOrdinal::parse(&self.cursor).ok()
    }

    /// Semantic version of the label. Cursor-shaped labels yield `None`.
    #[must_use]
    pub fn semver_ordinal(&self) -> Option<VersionOrdinal> {
        VersionOrdinal::parse(&self.label)
            .ok()
            .filter(|ordinal| ordinal.as_semver().is_some())
    }

    /// True while the release still needs configuration.
    #[must_use]
    pub fn needs_configuration(&self) -> bool {
        self.status == ReleaseStatus::PendingConfig
    }
}

/// Read-only view of the releases known for one (app, cluster) pair.
///
/// Releases are held in descending sequence order regardless of the order
/// they were supplied in.
#[derive(Debug, Clone)]
pub struct ReleaseCatalog {
    app_id: AppId,
    cluster_id: ClusterId,
    releases: Vec<Release>,
    current_sequence: Option<u64>,
}

impl ReleaseCatalog {
    /// Build a catalog. `current_sequence` is the sequence deployed on the cluster.
    pub fn new(
        app_id: AppId,
        cluster_id: ClusterId,
        mut releases: Vec<Release>,
        current_sequence: Option<u64>,
    ) -> Self {
        releases.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Self {
            app_id,
            cluster_id,
            releases,
            current_sequence,
        }
    }

    #[must_use]
    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    #[must_use]
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }

    /// All releases, highest sequence first.
    #[must_use]
    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    #[must_use]
    pub fn current_sequence(&self) -> Option<u64> {
        self.current_sequence
    }

    /// The currently deployed release.
    #[must_use]
    pub fn current(&self) -> Option<&Release> {
        self.current_sequence.and_then(|seq| self.find(seq))
    }

    /// The highest-sequence release.
    #[must_use]
    pub fn latest(&self) -> Option<&Release> {
        self.releases.first()
    }

    #[must_use]
    pub fn find(&self, sequence: u64) -> Option<&Release> {
        self.releases.iter().find(|r| r.sequence == sequence)
    }

    /// Exact label match; the highest sequence wins on duplicate labels.
    #[must_use]
    pub fn find_by_label(&self, label: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.label == label)
    }

    /// Releases newer than the current one, highest sequence first.
    ///
    /// With nothing deployed every release is pending.
    pub fn pending(&self) -> impl Iterator<Item = &Release> {
        let current = self.current_sequence;
        self.releases
            .iter()
            .filter(move |r| current.map_or(true, |c| r.sequence > c))
    }

    /// True when `sequence` predates the currently deployed release.
    #[must_use]
    pub fn is_past_version(&self, sequence: u64) -> bool {
        self.current_sequence.is_some_and(|c| sequence < c)
    }
}
