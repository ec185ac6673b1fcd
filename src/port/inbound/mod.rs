//! Inbound (driving) ports consumed by inbound adapters.
//!
//! - [`callback`]: deploy and undeploy results reported by agents

pub mod callback;
