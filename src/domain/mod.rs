//! Domain types: versions, releases, policies and the restore state machine.
//!
//! Nothing in here performs I/O; the application layer drives these types
//! through the outbound ports.

pub mod app;
pub mod backup;
pub mod command;
pub mod error;
pub mod id;
pub mod policy;
pub mod release;
pub mod restore;
pub mod task;
pub mod update;
pub mod version;

pub use app::App;
pub use backup::{Backup, LabelSelector, Restore, RestorePhase};
pub use command::{AgentCommand, AgentMessage, DeployAction, DeployCommand};
pub use error::{DecisionError, VersionError};
pub use id::{AppId, ClusterId, SessionId};
pub use policy::{AutoDeploy, DeployPolicy};
pub use release::{Release, ReleaseCatalog, ReleaseStatus};
pub use restore::{RestoreEvent, RestoreState};
pub use task::{TaskState, TaskStatus};
pub use update::{DownloadedUpdate, PendingUpdate};
pub use version::VersionOrdinal;
