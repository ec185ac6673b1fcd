//! Support-bundle collection port.

use async_trait::async_trait;

use crate::domain::app::App;
use crate::error::Result;

/// Triggers a support-bundle snapshot for an app.
#[async_trait]
pub trait SupportBundleCollector: Send + Sync {
    async fn collect(&self, app: &App) -> Result<()>;
}
