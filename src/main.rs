use anyhow::Result;
use clap::Parser;

use priceguard::application::{Cli, CommandExecutor};
use priceguard::shared::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(state) = &cli.state {
        config.state_path = state.clone();
    }

    let executor = CommandExecutor::new(config);
    executor.execute(cli.command).await?;
    Ok(())
}
