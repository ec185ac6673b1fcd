//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`]: builders for releases, catalogs, apps and backups
//! - [`fake`]: scripted upstream, failing renderer and recording collaborators
//! - [`session`]: connect fake agents to a registry and drain their queues
//! - [`config`]: canonical configuration documents

pub mod config;
pub mod domain;
pub mod fake;
pub mod session;
