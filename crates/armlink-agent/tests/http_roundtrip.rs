//! The control loop against in-process HTTP stand-ins for the gateway and
//! the chat completions endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use armlink_agent::{
    ChatCompletionsDecider, ControlLoop, GatewayClient, HttpGatewayClient, RunOutcome,
};
use armlink_core::{AgentSettings, CalibrationRecord, PixelOffset};

#[derive(Clone, Default)]
struct Recorder {
    commands: Arc<Mutex<Vec<(String, Value)>>>,
    completions: Arc<AtomicUsize>,
    fail_clicks: bool,
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([90, 90, 90]));
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut bytes)
        .encode_image(&image)
        .unwrap();
    bytes
}

async fn video_feed() -> Response {
    let mut body = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
    body.extend_from_slice(&jpeg(640, 480));
    body.extend_from_slice(b"\r\n");
    (
        [(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )],
        Body::from(body),
    )
        .into_response()
}

async fn command(recorder: &Recorder, path: &str, body: Value) -> (StatusCode, Json<Value>) {
    recorder
        .commands
        .lock()
        .unwrap()
        .push((path.to_string(), body));
    if path == "click" && recorder.fail_clicks {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": "dispatch failed" })),
        );
    }
    (StatusCode::OK, Json(json!({ "status": "success" })))
}

async fn move_handler(State(recorder): State<Recorder>, Json(body): Json<Value>) -> impl IntoResponse {
    command(&recorder, "move", body).await
}

async fn click_handler(State(recorder): State<Recorder>, Json(body): Json<Value>) -> impl IntoResponse {
    command(&recorder, "click", body).await
}

async fn completions(State(recorder): State<Recorder>, Json(body): Json<Value>) -> Json<Value> {
    let url = body["messages"][1]["content"][1]["image_url"]["url"]
        .as_str()
        .unwrap_or_default();
    assert!(url.starts_with("data:image/jpeg;base64,"));

    let content = match recorder.completions.fetch_add(1, Ordering::SeqCst) {
        0 => r#"Looking at the screen. {"POINT": [500, 500], "REASON": "center"}"#,
        _ => r#"{"STATUS": "finish", "REASON": "done"}"#,
    };
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
}

async fn serve(recorder: Recorder) -> String {
    let app = Router::new()
        .route("/video_feed", get(video_feed))
        .route("/move", post(move_handler))
        .route("/click", post(click_handler))
        .route("/v1/chat/completions", post(completions))
        .with_state(recorder);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn settings(base: &str) -> AgentSettings {
    let mut settings = AgentSettings {
        gateway_url: base.to_string(),
        home_settle_ms: 0,
        act_settle_ms: 0,
        ..AgentSettings::default()
    };
    settings.decision.endpoint = format!("{base}/v1/chat/completions");
    settings.decision.retry_wait_ms = 10;
    settings
        .extra_headers
        .insert("ngrok-skip-browser-warning".to_string(), "true".to_string());
    settings
}

#[tokio::test]
async fn observe_reads_first_frame_from_stream() {
    let base = serve(Recorder::default()).await;
    let client = HttpGatewayClient::new(&settings(&base)).unwrap();

    let observation = client.observe().await.unwrap();
    assert_eq!(observation.size().width, 640);
    assert_eq!(observation.size().height, 480);
}

#[tokio::test]
async fn control_loop_clicks_then_finishes() {
    let recorder = Recorder::default();
    let base = serve(recorder.clone()).await;
    let settings = settings(&base);

    let gateway = HttpGatewayClient::new(&settings).unwrap();
    let decider = ChatCompletionsDecider::new(settings.decision.clone()).unwrap();
    let calibration = CalibrationRecord::new(0.1, PixelOffset(0.0, 0.0)).unwrap();
    let mut control = ControlLoop::new(gateway, decider, calibration, settings);

    let report = control.run("tap the middle of the screen").await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Finished { step: 2 });

    let commands = recorder.commands.lock().unwrap().clone();
    let paths: Vec<&str> = commands.iter().map(|(path, _)| path.as_str()).collect();
    assert_eq!(paths, vec!["move", "click", "move"]);
    assert_eq!(commands[1].1, json!({ "x": 0.0, "y": 0.0 }));
}

#[tokio::test]
async fn failed_click_is_reported_not_fatal() {
    let recorder = Recorder {
        fail_clicks: true,
        ..Recorder::default()
    };
    let base = serve(recorder.clone()).await;
    let client = HttpGatewayClient::new(&settings(&base)).unwrap();

    let result = client
        .click(armlink_core::PhysicalPosition::new(1.0, 2.0))
        .await;
    assert!(matches!(result, Err(armlink_core::Error::Dispatch(_))));
    assert!(client
        .move_to(armlink_core::PhysicalPosition::origin())
        .await
        .is_ok());
}
