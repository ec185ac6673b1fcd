//! Infrastructure configuration modules.

pub mod logging;
pub mod seed;
pub mod server;
pub mod service;
pub mod settings;
pub mod upstream;

pub use settings::Config;
