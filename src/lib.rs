//! Harbormaster - release control plane for Kubernetes application agents.
//!
//! Decides, for each managed app and each connected downstream cluster agent,
//! which release sequence should run, and drives the agent through deploy,
//! undeploy and disaster-recovery restore over a long-lived WebSocket.
//!
//! # Architecture
//!
//! - **Update scanner** - scheduled and manual checks against the upstream;
//!   new releases are persisted and the decision engine picks the desired
//!   sequence per cluster
//! - **Decision engine** - explicit latest/label policies and automatic
//!   semver or cursor tiers, with rollback and configuration checks
//! - **Deploy dispatcher** - 1s loop sending a deploy whenever a session's
//!   last dispatched sequence differs from the desired one
//! - **Restore coordinator** - 1s loop driving undeploy → restore → redeploy
//!
//! # Modules
//!
//! - [`domain`] - Version ordinals, releases, policies, restore state, wire commands
//! - [`port`] - Traits for persistence, rendering, backups, upstream and callbacks
//! - [`application`] - The services above plus the session registry
//! - [`adapter`] - WebSocket gateway, CLI, in-memory store, HTTP upstream
//! - [`infrastructure`] - Configuration, bootstrap and runtime
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `testkit` - Builders and fakes for integration tests

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
