//! # armlink-agent
//!
//! Agent-side control loop for the armlink gateway.
//!
//! This crate provides:
//! - A gateway client for the command and video stream endpoints
//! - The decision collaborator seam and its JSON payload parser
//! - An OpenAI-compatible chat completions decider
//! - The HOME, OBSERVE, DECIDE, ACT loop with a step budget
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends only on armlink-core
//! and talks to the gateway over HTTP.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chat;
pub mod client;
pub mod control;
pub mod decision;

// Re-export commonly used types
pub use chat::{jpeg_data_url, ChatCompletionsDecider};
pub use client::{extract_jpeg, GatewayClient, HttpGatewayClient, Observation};
pub use control::{ControlLoop, RunOutcome, RunReport};
pub use decision::{parse_decision, task_prompt, Decision, DecisionMaker};
