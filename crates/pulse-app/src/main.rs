//! Pulse client entry point.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

/// Headless reconciliation client for the Pulse trading dashboard.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PULSE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Do not start the local view server
    #[arg(long)]
    no_dashboard: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    pulse_ws::init_crypto();

    let args = Args::parse();

    pulse_telemetry::init_logging()?;
    pulse_telemetry::Metrics::install()?;

    info!("Starting Pulse v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > PULSE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PULSE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = pulse_app::AppConfig::load(&config_path)?;

    let app = pulse_app::Application::new(config)?;
    let shutdown = app.shutdown_token();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        shutdown.cancel();
    });

    app.run(!args.no_dashboard).await?;
    Ok(())
}
