use anyhow::{Context, Result};
use clap::Parser;

use driplnk::cli::{Cli, Commands};
use driplnk::config::{get_config, init_config};
use driplnk::runtime::modes;
use driplnk::system::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let config = get_config();

    let _guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => modes::run_serve(&config).await,
        command => modes::run_cli(command, &config).await,
    }
}
