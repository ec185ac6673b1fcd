//! In-memory adapters for the standalone runtime and tests.

mod snapshot;
mod store;

pub use snapshot::MemoryBackupService;
pub use store::MemoryStore;
