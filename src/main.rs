use anyhow::Context;
use clap::Parser;

use harbormaster::adapter::inbound::cli::command::{Cli, Commands};
use harbormaster::adapter::inbound::cli::{run, validate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run::execute(&args)
            .await
            .with_context(|| format!("harbormaster run failed ({})", args.config.display())),
        Commands::ValidateConfig(args) => validate::execute(&args)
            .with_context(|| format!("invalid configuration {}", args.config.display())),
    }
}
