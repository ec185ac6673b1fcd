//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the collaborators this control plane consumes:
//! persistence, manifest rendering, backup/restore objects, the upstream
//! release service and support-bundle collection.

pub mod render;
pub mod snapshot;
pub mod store;
pub mod support_bundle;
pub mod upstream;
