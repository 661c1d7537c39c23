//! HTTP surface of the gateway.
//!
//! - `GET /video_feed`: `multipart/x-mixed-replace` JPEG stream
//! - `POST /click`: move to `{"x", "y"}` (millimeters) and click
//! - `POST /move`: move only
//! - `GET /status`: lifecycle state

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use armlink_core::{ActionIntent, Error, PhysicalPosition};

use crate::gateway::state::{Gateway, GatewayState, StatusReport};

/// Multipart boundary of the video stream.
pub const STREAM_BOUNDARY: &str = "frame";

/// Build the gateway router.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/video_feed", get(video_feed))
        .route("/click", post(click))
        .route("/move", post(move_to))
        .route("/status", get(status))
        .with_state(gateway)
}

/// Error surfaced to HTTP clients as `{"status": "error", "message": ...}`.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Error::Protocol(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "status": "error", "message": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Parse `{"x": number, "y": number}`.
pub fn parse_target(body: &[u8]) -> Result<PhysicalPosition, Error> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::Protocol(format!("request body is not JSON: {e}")))?;
    let coordinate = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| Error::Protocol(format!("missing or invalid coordinate '{name}'")))
    };
    Ok(PhysicalPosition::new(coordinate("x")?, coordinate("y")?))
}

/// Run one intent on the hardware.
///
/// The sequence runs on its own task, so a client that disconnects
/// mid-request never leaves the effector pressed.
async fn dispatch(
    gateway: &Arc<Gateway>,
    body: &[u8],
    intent: fn(PhysicalPosition) -> ActionIntent,
) -> Result<Json<Value>, ApiError> {
    if !gateway.is_ready() {
        return Err(Error::NotReady.into());
    }
    let action = intent(parse_target(body)?);

    let gateway = Arc::clone(gateway);
    let task = tokio::spawn(async move {
        let mut rig = gateway.hardware().await?;
        rig.execute(action).await?;
        Ok::<(), Error>(())
    });
    task.await
        .map_err(|e| Error::Dispatch(format!("command task failed: {e}")))??;
    Ok(Json(json!({ "status": "success" })))
}

#[instrument(skip_all)]
async fn click(State(gateway): State<Arc<Gateway>>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let result = dispatch(&gateway, &body, ActionIntent::move_and_click).await;
    if let Err(ApiError(e)) = &result {
        warn!("Click request failed: {}", e);
    }
    result
}

#[instrument(skip_all)]
async fn move_to(State(gateway): State<Arc<Gateway>>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let result = dispatch(&gateway, &body, ActionIntent::move_to).await;
    if let Err(ApiError(e)) = &result {
        warn!("Move request failed: {}", e);
    }
    result
}

#[instrument(skip_all)]
async fn status(State(gateway): State<Arc<Gateway>>) -> Json<StatusReport> {
    Json(StatusReport::from(&gateway.state()))
}

#[instrument(skip_all)]
async fn video_feed(State(gateway): State<Arc<Gateway>>) -> Response {
    info!("Video stream client connected");
    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={STREAM_BOUNDARY}"),
        )],
        Body::from_stream(frame_stream(gateway)),
    )
        .into_response()
}

/// One multipart part carrying a JPEG.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{STREAM_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Endless JPEG parts; idles until ready and ends at shutdown.
pub fn frame_stream(gateway: Arc<Gateway>) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold(gateway, |gateway| async move {
        loop {
            match gateway.state() {
                GatewayState::Ready => {}
                GatewayState::Shutdown => {
                    info!("Video stream ended by shutdown");
                    return None;
                }
                _ => {
                    tokio::time::sleep(gateway.idle_poll()).await;
                    continue;
                }
            }

            let (captured, retry_delay) = match gateway.hardware().await {
                Ok(mut rig) => {
                    let retry_delay = rig.camera().retry_delay();
                    (rig.capture_jpeg().await, retry_delay)
                }
                Err(_) => (None, gateway.idle_poll()),
            };

            match captured {
                Some(Ok(jpeg)) => return Some((Ok(multipart_part(&jpeg)), gateway)),
                Some(Err(e)) => warn!("Frame encoding failed: {}", e),
                None => debug!("No frame available"),
            }
            tokio::time::sleep(retry_delay).await;
        }
    })
}
