//! In-memory backup and restore objects.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::backup::{Backup, LabelSelector, Restore, RestorePhase};
use crate::error::{Error, Result};
use crate::port::outbound::snapshot::BackupService;

#[derive(Debug, Default)]
pub struct MemoryBackupService {
    backups: RwLock<HashMap<String, Backup>>,
    restores: RwLock<HashMap<String, Restore>>,
}

impl MemoryBackupService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_backup(&self, backup: Backup) {
        self.backups.write().insert(backup.name.clone(), backup);
    }

    /// Move an existing restore to `phase`. Returns false when it does not exist.
    pub fn set_restore_phase(&self, name: &str, phase: RestorePhase) -> bool {
        match self.restores.write().get_mut(name) {
            Some(restore) => {
                restore.phase = phase;
                true
            }
            None => false,
        }
    }

    /// Every restore created so far, sorted by name.
    #[must_use]
    pub fn restores(&self) -> Vec<Restore> {
        let mut restores: Vec<_> = self.restores.read().values().cloned().collect();
        restores.sort_by(|a, b| a.name.cmp(&b.name));
        restores
    }
}

#[async_trait]
impl BackupService for MemoryBackupService {
    async fn get_backup(&self, name: &str) -> Result<Option<Backup>> {
        Ok(self.backups.read().get(name).cloned())
    }

    async fn get_restore(&self, name: &str) -> Result<Option<Restore>> {
        Ok(self.restores.read().get(name).cloned())
    }

    async fn create_restore(
        &self,
        name: &str,
        backup: &Backup,
        selector: Option<LabelSelector>,
    ) -> Result<Restore> {
        let mut restores = self.restores.write();
        if restores.contains_key(name) {
            return Err(Error::Snapshot(format!("restore {name} already exists")));
        }
        let restore = Restore {
            name: name.to_string(),
            backup_name: backup.name.clone(),
            selector,
            phase: RestorePhase::New,
        };
        restores.insert(name.to_string(), restore.clone());
        Ok(restore)
    }
}
