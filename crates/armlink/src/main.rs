//! # armlink
//!
//! Gateway and tools for a camera-guided XY actuator.
//!
//! ## Overview
//!
//! - `serve`: hold the actuator session and camera, expose them over HTTP
//! - `calibrate`: interactive hand-eye calibration
//! - `agent`: drive a gateway from a decision model
//! - `camera-check`: grab a single frame
//!
//! ## Architecture
//!
//! This is Layer 3 - the binary that ties together:
//! - armlink-core: Core types
//! - armlink-hardware: Actuator and camera access
//! - armlink-calibration: Calibration procedure
//! - armlink-agent: Control loop

use clap::Parser;

use armlink::cli::Cli;
use armlink::commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    tracing::info!("armlink v{} starting", env!("CARGO_PKG_VERSION"));

    commands::run(cli.command, config).await.map_err(|e| {
        tracing::error!("{:#}", e);
        e
    })
}
