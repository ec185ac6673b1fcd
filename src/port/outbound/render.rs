//! Manifest rendering port.

use async_trait::async_trait;

use crate::domain::app::App;
use crate::error::Result;

/// Rendered manifests plus the deploy settings that travel with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedRelease {
    pub manifests: Vec<u8>,
    pub kubectl_version: String,
    pub additional_namespaces: Vec<String>,
    pub image_pull_secret: Option<String>,
    /// Resource-watch hints for readiness reporting.
    pub informers: Vec<String>,
    /// Whether the agent should wait for resources to become ready.
    pub wait: bool,
}

/// Renders the manifests of one release.
#[async_trait]
pub trait ManifestRenderer: Send + Sync {
    async fn render(&self, app: &App, sequence: u64) -> Result<RenderedRelease>;
}
