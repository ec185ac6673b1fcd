//! Support-bundle collector that records requests in the log.
//!
//! Collection itself runs out of process; this adapter marks the request so
//! operators can correlate bundles with restores.

use async_trait::async_trait;
use tracing::info;

use crate::domain::app::App;
use crate::error::Result;
use crate::port::outbound::support_bundle::SupportBundleCollector;

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSupportBundles;

#[async_trait]
impl SupportBundleCollector for LoggingSupportBundles {
    async fn collect(&self, app: &App) -> Result<()> {
        info!(app = %app.id, slug = %app.slug, "Support bundle requested");
        Ok(())
    }
}
