//! # armlink-hardware
//!
//! Hardware access for armlink.
//!
//! This crate provides:
//! - Actuator session acquisition with bounded retry ([`SessionManager`])
//! - Command encoding and serialized dispatch ([`CommandChannel`])
//! - Camera capture normalized to the canonical orientation ([`FrameSource`])
//! - The owned hardware bundle handed to every consumer ([`Rig`])
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends only on armlink-core.
//! Nothing here is global; a [`Rig`] is opened explicitly and owned by the
//! caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod camera;
pub mod channel;
pub mod codes;
pub mod frame;
pub mod mock;
#[cfg(feature = "native-camera")]
pub mod native;
pub mod rig;
pub mod service;
pub mod session;

// Re-export commonly used types
pub use camera::{CameraDevice, FrameSource, SyntheticCamera};
pub use channel::CommandChannel;
pub use codes::CommandCode;
pub use frame::Frame;
pub use rig::Rig;
pub use service::{parse_resource_id, ActuatorService, HttpActuatorService};
pub use session::{Session, SessionManager};
