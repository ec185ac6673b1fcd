//! Outbound adapters (driven side).

pub mod memory;
pub mod support_bundle;
pub mod upstream;
