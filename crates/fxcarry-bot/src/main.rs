//! fxcarry swap-income trading bot - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// AI-assisted FX carry-trade bot with a hard safety core.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FXCARRY_CONFIG).
    #[arg(short, long)]
    config: Option<String>,

    /// Reconcile coordinator state against the exchange, then exit.
    /// This is the operator path out of a HALTED state.
    #[arg(long)]
    reconcile: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    fxcarry_telemetry::init_logging()?;

    info!("Starting fxcarry v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .or_else(|| std::env::var("FXCARRY_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = fxcarry_bot::AppConfig::from_file(&config_path)?;

    let app = fxcarry_bot::Application::new(config)?;

    if args.reconcile {
        let state = app.reconcile_once().await?;
        info!(%state, "Reconciliation done");
        return Ok(());
    }

    app.run().await?;
    Ok(())
}
