//! Application services (use cases).
//!
//! These services orchestrate domain logic and drive the outbound ports:
//!
//! - [`scanner`]: scheduled and manual update checks
//! - [`decision`]: desired-sequence selection
//! - [`session`]: live agent sessions and their dispatch memory
//! - [`dispatch`]: the deploy loop
//! - [`restore`]: the disaster-recovery loop
//! - [`callback`]: results reported back by agents

pub mod callback;
pub mod decision;
pub mod dispatch;
pub mod restore;
pub mod scanner;
pub mod service;
pub mod session;

pub use callback::ResultCallbacks;
pub use decision::DeployDecisionEngine;
pub use dispatch::{DeployDispatcher, DispatchSettings, UndeployRequest};
pub use restore::{RestoreCoordinator, RestoreSettings};
pub use scanner::{CheckRequest, ScannerSettings, UpdateCheckOutcome, UpdateCheckReport, UpdateScanner};
pub use service::ServiceHandle;
pub use session::{ClusterSessionRegistry, SessionSnapshot};
