use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use warden::{Config, Runtime};

#[derive(Parser)]
#[command(name = "warden", version, about = "Session authentication and identifier pooling service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "warden.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let runtime = Runtime::start(&config).context("starting warden runtime")?;
    tracing::info!("warden running; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    runtime.shutdown().await;

    Ok(())
}
