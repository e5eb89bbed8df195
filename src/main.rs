//! CLI entry point for the VNA middle layer.
//!
//! Loads configuration, initializes tracing, opens the switch serial port
//! and dials the calibration RPC server (both process-fatal on failure,
//! since there is no way to serve any request without them), and spawns
//! the dispatcher. The WebSocket relay that feeds requests in and frames
//! responses back out is external to this crate (spec §1); this binary
//! only starts the dispatcher and waits for Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use vna_mid::config::Settings;
use vna_mid::rpc::GrpcCalibrationClient;
use vna_mid::server::Server;
use vna_mid::switch::{SerialSwitchDriver, SwitchTimeouts};
use vna_mid::vna::MockVnaDriver;

#[derive(Parser)]
#[command(name = "vna-mid")]
#[command(about = "Middle layer for a two-port VNA instrument server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<String>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&settings.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(endpoint = %settings.rpc.endpoint, "dialing calibration RPC server");
    let rpc = GrpcCalibrationClient::connect(settings.rpc.endpoint.clone())
        .await
        .context("failed to connect to calibration RPC server")?;

    tracing::info!(port = %settings.switch.port, baud = settings.switch.baud, "opening switch serial port");
    let timeouts = SwitchTimeouts {
        drain_timeout: std::time::Duration::from_millis(settings.switch.drain_timeout_ms),
        reply_drain_timeout: std::time::Duration::from_millis(settings.switch.reply_drain_timeout_ms),
        read_timeout: settings.timeouts.timeout_usb(),
    };
    #[cfg(feature = "switch_serial")]
    let switch = SerialSwitchDriver::open(&settings.switch.port, settings.switch.baud, timeouts)
        .await
        .context("failed to open switch serial port")?;
    #[cfg(not(feature = "switch_serial"))]
    let switch = {
        let _ = timeouts;
        anyhow::bail!("this build was compiled without the `switch_serial` feature");
    };

    // No real vendor VNA SDK is part of this crate (spec §1); operators
    // wire in their own VnaDriver implementation in a fork of this binary.
    let vna = MockVnaDriver::new();

    let server = Server::spawn(
        Arc::new(switch),
        Arc::new(vna),
        Arc::new(rpc),
        settings.timeouts.timeout_request(),
        64,
    );

    tracing::info!("vna-mid is running, press Ctrl-C to stop");
    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    server.shutdown().await;

    Ok(())
}
