//! CLI module graph.

pub mod command;
pub mod output;
pub mod run;
pub mod validate;
