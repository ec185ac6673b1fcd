//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!   agent gateway ──►│      Application        │──► store, renderer,
//!   (inbound)        │  Domain + Port          │    backups, upstream,
//!                    └─────────────────────────┘    support bundles
//! ```
//!
//! - [`inbound`] - Surfaces the application exposes to drivers.
//! - [`outbound`] - Collaborators the application drives.

pub mod inbound;
pub mod outbound;
