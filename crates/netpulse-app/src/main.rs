//! netpulse dashboard client - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Live network operations dashboard client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via NETPULSE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    netpulse_telemetry::init_logging()?;

    info!("Starting netpulse v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > NETPULSE_CONFIG env var > default path > built-in defaults
    let config = match args.config {
        Some(path) => {
            info!(config_path = %path, "Loading configuration");
            netpulse_app::AppConfig::from_file(&path)?
        }
        None => netpulse_app::AppConfig::load()?,
    };
    info!(base_url = %config.base_url, cache = config.cache.enabled, "Configuration loaded");

    let app = netpulse_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
