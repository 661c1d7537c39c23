//! Configuration types for armlink.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Error;

/// Top-level configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArmConfig {
    /// Remote actuator service settings
    pub actuator: ActuatorSettings,
    /// Camera settings
    pub camera: CameraSettings,
    /// Gateway listener settings
    pub gateway: GatewaySettings,
    /// Calibration procedure settings
    pub calibration: CalibrationSettings,
    /// Control loop settings
    pub agent: AgentSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl ArmConfig {
    /// Default configuration with the synthetic camera, for dry runs
    /// without a camera attached.
    pub fn synthetic() -> Self {
        Self {
            camera: CameraSettings::synthetic(),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: ArmConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.actuator.port.trim().is_empty() {
            return Err(Error::Config("actuator.port cannot be empty".to_string()));
        }
        if self.actuator.max_attempts == 0 {
            return Err(Error::Config(
                "actuator.max_attempts must be > 0".to_string(),
            ));
        }
        validate_url("actuator.server_url", &self.actuator.server_url)?;

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::Config("camera dimensions must be > 0".to_string()));
        }
        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(Error::Config(format!(
                "camera.jpeg_quality must be within 1..=100, got {}",
                self.camera.jpeg_quality
            )));
        }

        if !positive(self.calibration.known_move_dist_mm) {
            return Err(Error::Config(
                "calibration.known_move_dist_mm must be > 0".to_string(),
            ));
        }
        if !positive(self.calibration.min_pixel_displacement) {
            return Err(Error::Config(
                "calibration.min_pixel_displacement must be > 0".to_string(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(Error::Config("agent.max_steps must be > 0".to_string()));
        }
        validate_url("agent.gateway_url", &self.agent.gateway_url)?;
        validate_url("agent.decision.endpoint", &self.agent.decision.endpoint)?;

        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn validate_url(field: &str, value: &str) -> crate::Result<()> {
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("{field} is not a valid URL '{value}': {e}")))
}

/// Remote actuator service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorSettings {
    /// RPC endpoint of the actuator-control service
    pub server_url: String,
    /// Communication port identifier passed on acquisition
    pub port: String,
    /// Session acquisition attempts before giving up
    pub max_attempts: u32,
    /// Delay between acquisition attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Settling delay after a successful acquisition in milliseconds
    pub connect_settle_ms: u64,
    /// Timeout of one acquisition request in milliseconds
    pub request_timeout_ms: u64,
    /// Timeout of one command request in milliseconds
    pub command_timeout_ms: u64,
    /// Pause after each dispatched command in milliseconds
    pub command_settle_ms: u64,
    /// Pause between the halves of a click, and before a click in move-and-click
    pub click_settle_ms: u64,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8082/MyWcfService/getstring".to_string(),
            port: "COM10".to_string(),
            max_attempts: 5,
            retry_delay_ms: 2000,
            connect_settle_ms: 2000,
            request_timeout_ms: 5000,
            command_timeout_ms: 2000,
            command_settle_ms: 200,
            click_settle_ms: 100,
        }
    }
}

impl ActuatorSettings {
    /// Delay between acquisition attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Settling delay after acquisition.
    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    /// Pause after each command.
    pub fn command_settle(&self) -> Duration {
        Duration::from_millis(self.command_settle_ms)
    }

    /// Pause inside click sequences.
    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }
}

/// Camera backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    /// Generated test pattern for dry runs and tests
    Synthetic,
    /// Platform camera by device index (requires the `native-camera` feature)
    #[default]
    Native,
}

/// Camera settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Which backend opens the device
    pub backend: CameraBackend,
    /// Device index
    pub index: u32,
    /// Requested sensor width (the device may choose another)
    pub width: u32,
    /// Requested sensor height (the device may choose another)
    pub height: u32,
    /// JPEG quality for streamed frames (1-100)
    pub jpeg_quality: u8,
    /// Wait after a failed read before trying again, in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Native,
            index: 1,
            width: 640,
            height: 480,
            jpeg_quality: 80,
            retry_delay_ms: 100,
        }
    }
}

impl CameraSettings {
    /// Default settings on the synthetic backend.
    pub fn synthetic() -> Self {
        Self {
            backend: CameraBackend::Synthetic,
            ..Self::default()
        }
    }

    /// Wait after a failed read.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Gateway listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Socket address to bind
    pub bind: String,
    /// Stream idle wait while hardware is not ready, in milliseconds
    pub idle_poll_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            idle_poll_ms: 1000,
        }
    }
}

/// Calibration procedure settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Physical displacement used to derive the scale, in millimeters
    pub known_move_dist_mm: f64,
    /// Smallest pixel displacement accepted for the scale
    pub min_pixel_displacement: f64,
    /// Settle after each calibration move, in milliseconds
    pub move_settle_ms: u64,
    /// Where the calibration artifact is written and read
    pub output: PathBuf,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            known_move_dist_mm: 50.0,
            min_pixel_displacement: crate::calibration::MIN_PIXEL_DISPLACEMENT,
            move_settle_ms: 2000,
            output: PathBuf::from("final_config.json"),
        }
    }
}

impl CalibrationSettings {
    /// Settle after each calibration move.
    pub fn move_settle(&self) -> Duration {
        Duration::from_millis(self.move_settle_ms)
    }
}

/// Control loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Base URL of the gateway
    pub gateway_url: String,
    /// Step budget
    pub max_steps: u32,
    /// Settle after homing, in milliseconds
    pub home_settle_ms: u64,
    /// Settle after an act step, in milliseconds
    pub act_settle_ms: u64,
    /// Timeout of each gateway call, in milliseconds
    pub http_timeout_ms: u64,
    /// Extra headers sent on every gateway call
    pub extra_headers: BTreeMap<String, String>,
    /// Decision collaborator settings
    pub decision: DecisionSettings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:5000".to_string(),
            max_steps: 10,
            home_settle_ms: 2000,
            act_settle_ms: 3000,
            http_timeout_ms: 10_000,
            extra_headers: BTreeMap::new(),
            decision: DecisionSettings::default(),
        }
    }
}

impl AgentSettings {
    /// Settle after homing.
    pub fn home_settle(&self) -> Duration {
        Duration::from_millis(self.home_settle_ms)
    }

    /// Settle after an act step.
    pub fn act_settle(&self) -> Duration {
        Duration::from_millis(self.act_settle_ms)
    }

    /// Timeout of each gateway call.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Decision collaborator settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionSettings {
    /// Chat completions endpoint
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Bearer token, if the endpoint requires one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Attempts per decision (capped at 5)
    pub max_retries: u32,
    /// Initial wait between attempts, doubled each retry, in milliseconds
    pub retry_wait_ms: u64,
    /// Completion token limit
    pub max_tokens: u32,
    /// Keep previous exchanges in the prompt
    pub use_history: bool,
    /// Number of exchanges kept when history is enabled
    pub history_size: usize,
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/v1/chat/completions".to_string(),
            model: "AgentCPM-GUI".to_string(),
            api_key: None,
            temperature: 0.1,
            max_retries: 3,
            retry_wait_ms: 20_000,
            max_tokens: 2048,
            use_history: false,
            history_size: 10,
        }
    }
}

impl DecisionSettings {
    /// Attempts per decision: non-positive values fall back to 3, capped at 5.
    pub fn attempts(&self) -> u32 {
        match self.max_retries {
            0 => 3,
            n => n.min(5),
        }
    }

    /// Initial wait between attempts.
    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
