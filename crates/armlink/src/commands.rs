//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use armlink_agent::{ChatCompletionsDecider, ControlLoop, HttpGatewayClient};
use armlink_calibration::procedure::FRAME_ATTEMPTS;
use armlink_calibration::{calibrate as run_calibration, ConsoleOperator};
use armlink_core::{ArmConfig, CalibrationRecord};
use armlink_hardware::{FrameSource, Rig};

use crate::cli::Command;
use crate::gateway::{router, Gateway};

/// Load the configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ArmConfig> {
    let config = match path {
        Some(path) => ArmConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ArmConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Run one subcommand to completion.
pub async fn run(command: Command, config: ArmConfig) -> anyhow::Result<()> {
    match command {
        Command::Serve { bind } => serve(config, bind).await,
        Command::Calibrate { output, preview } => calibrate(config, output, preview).await,
        Command::Agent {
            instruction,
            calibration,
            gateway,
        } => agent(config, instruction, calibration, gateway).await,
        Command::CameraCheck { output } => camera_check(config, output).await,
    }
}

/// Serve the gateway until Ctrl-C.
///
/// The listener is up before the hardware is; requests answer 503 until
/// acquisition finishes.
pub async fn serve(config: ArmConfig, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| config.gateway.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("Gateway listening on {}", listener.local_addr()?);

    let gateway = Gateway::new(config.gateway.clone());
    let hardware = config.clone();
    let init = gateway.initialize(async move { Rig::open(&hardware).await });

    let signal_gateway = Arc::clone(&gateway);
    axum::serve(listener, router(Arc::clone(&gateway)))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for the shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            signal_gateway.begin_shutdown();
        })
        .await?;

    gateway.shutdown().await;
    // An acquisition still in flight releases its hardware on completion
    if let Err(e) = init.await {
        warn!("Hardware initialization task ended abnormally: {}", e);
    }
    info!("Gateway stopped");
    Ok(())
}

/// Run the interactive calibration and save the artifact.
pub async fn calibrate(
    config: ArmConfig,
    output: Option<PathBuf>,
    preview: PathBuf,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| config.calibration.output.clone());
    let rig = Rig::open(&config).await?;
    let mut operator = ConsoleOperator::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        preview,
        config.camera.jpeg_quality,
    );

    let record = run_calibration(rig, &mut operator, &config.calibration).await?;
    record
        .save(&output)
        .with_context(|| format!("failed to save calibration to {}", output.display()))?;
    info!("Calibration saved to {}", output.display());
    Ok(())
}

/// Run the control loop against a gateway and print the report as JSON.
pub async fn agent(
    config: ArmConfig,
    instruction: Option<String>,
    calibration: Option<PathBuf>,
    gateway: Option<String>,
) -> anyhow::Result<()> {
    let calibration_path = calibration.unwrap_or_else(|| config.calibration.output.clone());
    let record = CalibrationRecord::load(&calibration_path).with_context(|| {
        format!(
            "failed to load calibration from {}",
            calibration_path.display()
        )
    })?;

    let mut settings = config.agent.clone();
    if let Some(url) = gateway {
        settings.gateway_url = url;
    }
    let instruction = match instruction {
        Some(instruction) => instruction,
        None => read_instruction().await?,
    };

    let client = HttpGatewayClient::new(&settings)?;
    let decider = ChatCompletionsDecider::new(settings.decision.clone())?;
    let mut control = ControlLoop::new(client, decider, record, settings);
    let report = control.run(&instruction).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn read_instruction() -> anyhow::Result<String> {
    println!("Enter the task instruction:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    let instruction = line.trim();
    anyhow::ensure!(!instruction.is_empty(), "no instruction given");
    Ok(instruction.to_string())
}

/// Grab one frame from the configured camera and write it as JPEG.
pub async fn camera_check(config: ArmConfig, output: PathBuf) -> anyhow::Result<()> {
    let mut camera = FrameSource::open(&config.camera).await?;
    if let Some(sensor) = camera.sensor_resolution() {
        info!("Sensor resolution {}x{}", sensor.width, sensor.height);
    }
    let frame = camera.capture_retrying(FRAME_ATTEMPTS).await;
    camera.release();

    let frame = frame?;
    let jpeg = frame.to_jpeg(config.camera.jpeg_quality)?;
    tokio::fs::write(&output, &jpeg)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    let size = frame.size();
    info!(
        "Wrote {}x{} frame to {}",
        size.width,
        size.height,
        output.display()
    );
    Ok(())
}
