//! # armlink-calibration
//!
//! Hand-eye calibration for armlink.
//!
//! This crate provides:
//! - The two-phase calibration state machine ([`CalibrationEngine`])
//! - The procedure that drives it against a [`Rig`](armlink_hardware::Rig)
//! - A line-oriented operator front end ([`ConsoleOperator`])
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on armlink-core and
//! armlink-hardware. Phase 1 derives `mm_per_pixel` from a known actuator
//! displacement; phase 2 measures the effector tip's pixel offset from the
//! frame center.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod console;
pub mod engine;
pub mod procedure;

// Re-export commonly used types
pub use console::{parse_point, ConsoleOperator};
pub use engine::{CalibrationEngine, CalibrationState, Checkpoint, Instruction};
pub use procedure::{calibrate, run, Operator};
