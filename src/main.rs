//! Enviro telemetry agent - main entry point
//!
//! Loads the key/value config, connects to the broker and runs the telemetry
//! loop until SIGINT or SIGTERM.

use clap::Parser;
use enviro_telemetry::agent::TelemetryLoop;
use enviro_telemetry::config::TelemetryConfig;
use enviro_telemetry::display::{ConsoleDisplay, DisplaySurface, NullDisplay};
use enviro_telemetry::observability::init_default_logging;
use enviro_telemetry::sensors::{IioSensorBoard, DEFAULT_IIO_ROOT};
use enviro_telemetry::transport::mqtt::MqttSession;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Environmental sensor board telemetry agent
#[derive(Parser)]
#[command(name = "enviro-telemetry")]
#[command(about = "Publish environmental sensor readings over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file of `name = value` lines
    #[arg(value_name = "CONFIG_FILE")]
    config_file: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    show: bool,

    /// Do not drive the status display
    #[arg(long)]
    headless: bool,

    /// Directory holding the IIO sensor devices
    #[arg(long, value_name = "DIR", env = "ENVIRO_IIO_ROOT", default_value = DEFAULT_IIO_ROOT)]
    iio_root: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize observability system
    init_default_logging();

    info!(
        "Starting enviro-telemetry v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = match TelemetryConfig::load_from_file(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %cli.config_file.display(), "Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    info!(config = ?config, "All config options present. Loaded");

    if cli.check || cli.show {
        if cli.show {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => {
                    error!("Failed to render configuration: {}", e);
                    process::exit(1);
                }
            }
        }
        info!("Configuration is valid");
        return;
    }

    let display: Box<dyn DisplaySurface> = if cli.headless {
        Box::new(NullDisplay)
    } else {
        Box::new(ConsoleDisplay::stderr())
    };

    if let Err(e) = run(config, cli.iio_root, display).await {
        error!("Agent stopped with error: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

async fn run(
    config: TelemetryConfig,
    iio_root: PathBuf,
    display: Box<dyn DisplaySurface>,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = MqttSession::new(&config)?;
    let sensors = IioSensorBoard::discover(&iio_root);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            warn!("Signal handling unavailable: {}", e);
            return;
        }
        let _ = shutdown_tx.send(true);
        // Keep the sender alive so the loop never sees a closed channel
        std::future::pending::<()>().await;
    });

    let mut telemetry = TelemetryLoop::new(config, transport, sensors, display);
    let result = telemetry.run(shutdown_rx).await;
    signals.abort();
    result.map_err(Into::into)
}

/// Resolve on the first SIGINT or SIGTERM
async fn wait_for_signal() -> std::io::Result<()> {
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
    Ok(())
}
