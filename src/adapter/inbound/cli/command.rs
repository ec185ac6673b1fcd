//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "harbormaster.toml";

/// Release control plane for downstream cluster agents
#[derive(Parser, Debug)]
#[command(name = "harbormaster")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control plane (gateway, update scanner, dispatch and restore loops)
    Run(RunArgs),

    /// Load and validate a configuration file
    ValidateConfig(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// JSON output for scripting
    #[arg(long)]
    pub json: bool,
}
