//! Upstream API response types.

use serde::Deserialize;

use crate::domain::update::PendingUpdate;

/// Response of `GET /release/<slug>/pending`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdatesResponse {
    #[serde(default)]
    pub updates: Vec<PendingUpdate>,
}

/// Response of `GET /license/<slug>`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseResponse {
    pub license_sequence: u64,
    /// Release carrying the new license, present when the license changed.
    #[serde(default)]
    pub update: Option<PendingUpdate>,
}
