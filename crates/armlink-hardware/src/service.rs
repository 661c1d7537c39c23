//! Transport to the remote actuator-control service.
//!
//! The service exposes a single GET endpoint. Every request carries three
//! query parameters: the communication port, the resource handle (0 while
//! acquiring) and a command code (0 while acquiring).

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use armlink_core::{ActuatorSettings, Error, Result};

use crate::codes::CommandCode;

/// Query parameter naming the communication port.
pub const PORT_PARAM: &str = "duankou";
/// Query parameter carrying the resource handle.
pub const HANDLE_PARAM: &str = "hco";
/// Query parameter carrying the command code.
pub const CODE_PARAM: &str = "daima";

/// Remote actuator-control service.
#[async_trait]
pub trait ActuatorService: Send + Sync {
    /// Request a resource handle for `port`, returning the raw response body.
    async fn request_handle(&self, port: &str) -> Result<String>;

    /// Send one command on an acquired handle. The response body is ignored.
    async fn send_command(&self, handle: i64, code: &CommandCode) -> Result<()>;
}

/// HTTP implementation of [`ActuatorService`].
#[derive(Debug, Clone)]
pub struct HttpActuatorService {
    client: reqwest::Client,
    url: reqwest::Url,
    request_timeout: Duration,
    command_timeout: Duration,
}

impl HttpActuatorService {
    /// Create a service client from actuator settings.
    pub fn new(settings: &ActuatorSettings) -> Result<Self> {
        let url = reqwest::Url::parse(&settings.server_url).map_err(|e| {
            Error::Config(format!(
                "invalid actuator server_url '{}': {e}",
                settings.server_url
            ))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            command_timeout: Duration::from_millis(settings.command_timeout_ms),
        })
    }
}

#[async_trait]
impl ActuatorService for HttpActuatorService {
    async fn request_handle(&self, port: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&[(PORT_PARAM, port), (HANDLE_PARAM, "0"), (CODE_PARAM, "0")])
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    async fn send_command(&self, handle: i64, code: &CommandCode) -> Result<()> {
        debug!("Sending command code '{}' on handle {}", code, handle);
        let handle = handle.to_string();
        self.client
            .get(self.url.clone())
            .query(&[
                (PORT_PARAM, "0"),
                (HANDLE_PARAM, handle.as_str()),
                (CODE_PARAM, code.as_str()),
            ])
            .timeout(self.command_timeout)
            .send()
            .await?;
        Ok(())
    }
}

/// Parse a resource id from an acquisition response body.
///
/// Accepts a JSON number, a JSON string holding an integer literal, or a bare
/// integer literal. Anything else is a protocol error for this attempt.
pub fn parse_resource_id(body: &str) -> Result<i64> {
    let trimmed = body.trim();
    let malformed = || Error::Protocol(format!("malformed resource id response: {trimmed:?}"));

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Number(number)) => {
            if let Some(id) = number.as_i64() {
                return Ok(id);
            }
            match number.as_f64() {
                Some(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
                    Ok(value as i64)
                }
                _ => Err(malformed()),
            }
        }
        Ok(serde_json::Value::String(inner)) => parse_integer_literal(&inner).ok_or_else(malformed),
        Ok(_) => Err(malformed()),
        Err(_) => parse_integer_literal(trimmed).ok_or_else(malformed),
    }
}

fn parse_integer_literal(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}
