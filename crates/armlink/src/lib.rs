//! # armlink
//!
//! Network gateway and command-line front end for a camera-guided XY actuator.
//!
//! This crate provides:
//!
//! - The HTTP gateway (video stream, click and move endpoints, status)
//! - The `armlink` command line: `serve`, `calibrate`, `agent`, `camera-check`
//!
//! ## Architecture
//!
//! This is Layer 3 - the binary crate that ties together:
//! - armlink-core: Core types, configuration, errors
//! - armlink-hardware: Actuator session, command channel, camera
//! - armlink-calibration: Hand-eye calibration procedure
//! - armlink-agent: Perception-decision-action loop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod commands;
pub mod gateway;

// Re-export commonly used types
pub use cli::{Cli, Command};
pub use gateway::{router, Gateway, GatewayState};
