//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Camera-guided XY actuator gateway and tools.
#[derive(Debug, Parser)]
#[command(name = "armlink", version, about)]
pub struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true, env = "ARMLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Acquire the hardware and serve the HTTP gateway
    Serve {
        /// Listen address, overrides `gateway.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run the interactive hand-eye calibration
    Calibrate {
        /// Calibration artifact path, overrides `calibration.output`
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Where the frame to mark is written
        #[arg(long, default_value = "calibration_preview.jpg")]
        preview: PathBuf,
    },
    /// Drive the gateway from decisions until the task finishes
    Agent {
        /// Task instruction; read from stdin when omitted
        #[arg(short, long)]
        instruction: Option<String>,
        /// Calibration artifact, overrides `calibration.output`
        #[arg(long)]
        calibration: Option<PathBuf>,
        /// Gateway base URL, overrides `agent.gateway_url`
        #[arg(long)]
        gateway: Option<String>,
    },
    /// Open the camera, grab one frame and write it as JPEG
    CameraCheck {
        /// Output JPEG path
        #[arg(short, long, default_value = "camera_check.jpg")]
        output: PathBuf,
    },
}
