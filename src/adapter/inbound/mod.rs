//! Inbound adapters (driving side).
//!
//! - [`gateway`]: WebSocket endpoint downstream agents connect to
//! - [`cli`]: command-line entry points

pub mod cli;
pub mod gateway;
