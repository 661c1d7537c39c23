//! # armlink-core
//!
//! Core types for armlink.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other armlink crates. It provides:
//!
//! - Geometry types (PixelPoint, PixelOffset, PhysicalPosition, FrameSize)
//! - The hand-eye calibration record and its JSON artifact
//! - The pixel to millimeter coordinate transform
//! - Action intents accepted by the command channel
//! - Configuration and error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other armlink crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod calibration;
pub mod config;
pub mod error;
pub mod geometry;
pub mod transform;

// Re-export commonly used types
pub use action::ActionIntent;
pub use calibration::CalibrationRecord;
pub use config::{
    ActuatorSettings, AgentSettings, ArmConfig, CalibrationSettings, CameraBackend,
    CameraSettings, DecisionSettings, GatewaySettings, LoggingSettings,
};
pub use error::{Error, Result};
pub use geometry::{FrameSize, PhysicalPosition, PixelOffset, PixelPoint};
pub use transform::{from_normalized, to_physical, NORMALIZED_SCALE};
