//! Backup and restore object port.

use async_trait::async_trait;

use crate::domain::backup::{Backup, LabelSelector, Restore};
use crate::error::Result;

/// Access to backup and restore custom resources.
#[async_trait]
pub trait BackupService: Send + Sync {
    /// Look up a backup by name.
    async fn get_backup(&self, name: &str) -> Result<Option<Backup>>;

    /// Look up a restore by name.
    async fn get_restore(&self, name: &str) -> Result<Option<Restore>>;

    /// Create a restore of `backup`, optionally scoped by a label selector.
    async fn create_restore(
        &self,
        name: &str,
        backup: &Backup,
        selector: Option<LabelSelector>,
    ) -> Result<Restore>;
}
