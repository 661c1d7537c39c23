//! HTTP client for the gateway's stream and command endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use armlink_core::{AgentSettings, Error, FrameSize, PhysicalPosition, Result};

/// Stream bytes read while looking for one complete frame.
pub const MAX_OBSERVATION_BYTES: usize = 8 * 1024 * 1024;

const JPEG_START: [u8; 2] = [0xFF, 0xD8];
const JPEG_END: [u8; 2] = [0xFF, 0xD9];

/// One frame taken from the gateway stream.
#[derive(Debug, Clone)]
pub struct Observation {
    jpeg: Vec<u8>,
    size: FrameSize,
}

impl Observation {
    /// Decode `jpeg` far enough to learn the frame dimensions.
    pub fn from_jpeg(jpeg: Vec<u8>) -> Result<Self> {
        let image = image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg)?;
        let size = FrameSize::new(image.width(), image.height());
        Ok(Self { jpeg, size })
    }

    /// Encoded frame.
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Frame dimensions.
    pub fn size(&self) -> FrameSize {
        self.size
    }
}

/// The first complete JPEG (`FF D8` .. `FF D9`) in `buffer`.
pub fn extract_jpeg(buffer: &[u8]) -> Option<&[u8]> {
    let start = find(buffer, &JPEG_START)?;
    let end = start + 2 + find(&buffer[start + 2..], &JPEG_END)?;
    Some(&buffer[start..end + 2])
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|window| window == needle)
}

/// The gateway as seen by the control loop.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Move without actuating Z.
    async fn move_to(&self, target: PhysicalPosition) -> Result<()>;

    /// Move and click.
    async fn click(&self, target: PhysicalPosition) -> Result<()>;

    /// Take one frame from the video stream.
    async fn observe(&self) -> Result<Observation>;
}

#[derive(Debug, Deserialize)]
struct Acknowledgment {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// [`GatewayClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGatewayClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpGatewayClient {
    /// Create a client from agent settings.
    pub fn new(settings: &AgentSettings) -> Result<Self> {
        reqwest::Url::parse(&settings.gateway_url).map_err(|e| {
            Error::Config(format!(
                "invalid gateway_url '{}': {e}",
                settings.gateway_url
            ))
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &settings.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: settings.gateway_url.trim_end_matches('/').to_string(),
            headers,
            timeout: settings.http_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn command(&self, path: &str, target: PhysicalPosition) -> Result<()> {
        debug!("POST /{} {}", path, target);
        let response = self
            .client
            .post(self.url(path))
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .json(&serde_json::json!({ "x": target.x_mm, "y": target.y_mm }))
            .send()
            .await?;

        let status = response.status();
        match response.json::<Acknowledgment>().await {
            Ok(ack) if status.is_success() && ack.status == "success" => Ok(()),
            Ok(ack) => Err(Error::Dispatch(format!(
                "/{path} returned {status}: {}",
                ack.message.unwrap_or(ack.status)
            ))),
            Err(_) => Err(Error::Dispatch(format!(
                "/{path} returned {status} without an acknowledgment"
            ))),
        }
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn move_to(&self, target: PhysicalPosition) -> Result<()> {
        self.command("move", target).await
    }

    async fn click(&self, target: PhysicalPosition) -> Result<()> {
        self.command("click", target).await
    }

    async fn observe(&self) -> Result<Observation> {
        let mut response = self
            .client
            .get(self.url("video_feed"))
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let mut buffer = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
            if let Some(jpeg) = extract_jpeg(&buffer) {
                return Observation::from_jpeg(jpeg.to_vec());
            }
            if buffer.len() > MAX_OBSERVATION_BYTES {
                return Err(Error::TransientCapture(format!(
                    "no complete frame in the first {} stream bytes",
                    buffer.len()
                )));
            }
        }
        Err(Error::TransientCapture(
            "video stream ended before a complete frame".to_string(),
        ))
    }
}
