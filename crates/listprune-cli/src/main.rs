mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use listprune_config::BotConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let config = BotConfig::load(cli.config.as_deref())?;

    match cli.command {
        cli::Commands::Run { dry_run } => commands::run::handle(&config, dry_run).await,
    }
}
