//! Upstream updates discovered by update checks.

use serde::{Deserialize, Serialize};

/// An update advertised by the upstream but not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub cursor: String,
    pub version_label: String,
    pub channel_id: String,
    #[serde(default)]
    pub is_required: bool,
}

/// A downloaded update ready to be persisted as a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedUpdate {
    pub update: PendingUpdate,
    /// Release archive as fetched from the upstream.
    pub archive: Vec<u8>,
    /// True when the release cannot deploy until it is configured.
    pub needs_config: bool,
    /// True when preflight checks must run before deploying.
    pub has_preflight: bool,
}
