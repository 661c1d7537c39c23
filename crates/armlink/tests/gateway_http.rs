//! Gateway endpoints against a mock actuator service and the synthetic camera.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use armlink::gateway::{router, Gateway, GatewayState};
use armlink_core::{ArmConfig, Error};
use armlink_hardware::mock::MockActuatorService;
use armlink_hardware::{Rig, SessionManager};

async fn open_rig(config: &ArmConfig) -> (Rig, Arc<MockActuatorService>) {
    let mock = Arc::new(MockActuatorService::new());
    let sessions = SessionManager::new(mock.clone(), config.actuator.clone());
    let rig = Rig::open_with(sessions, config).await.unwrap();
    mock.clear_commands();
    (rig, mock)
}

async fn ready_gateway() -> (Arc<Gateway>, Arc<MockActuatorService>) {
    let config = ArmConfig::synthetic();
    let (rig, mock) = open_rig(&config).await;
    let gateway = Gateway::new(config.gateway.clone());
    gateway.install(rig).await;
    (gateway, mock)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn commands_are_rejected_before_ready() {
    let gateway = Gateway::new(ArmConfig::default().gateway);

    let response = router(gateway.clone())
        .oneshot(post("/click", r#"{"x": 1, "y": 2}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");

    // Readiness is checked before the body is parsed
    let response = router(gateway)
        .oneshot(post("/move", "not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(start_paused = true)]
async fn click_dispatches_move_then_press_and_release() {
    let (gateway, mock) = ready_gateway().await;

    let response = router(gateway)
        .oneshot(post("/click", r#"{"x": 10, "y": 20}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "success" }));
    assert_eq!(mock.sent_codes(), vec!["x10y20", "z9", "z-8"]);
}

#[tokio::test(start_paused = true)]
async fn dropped_click_request_still_completes() {
    let (gateway, mock) = ready_gateway().await;

    // The client gives up after the press but before the release
    let request = router(gateway).oneshot(post("/click", r#"{"x": 10, "y": 20}"#));
    assert!(tokio::time::timeout(Duration::from_millis(350), request)
        .await
        .is_err());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(mock.sent_codes(), vec!["x10y20", "z9", "z-8"]);
}

#[tokio::test(start_paused = true)]
async fn move_dispatches_a_single_code() {
    let (gateway, mock) = ready_gateway().await;

    let response = router(gateway)
        .oneshot(post("/move", r#"{"x": -3.9, "y": 7.2}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.sent_codes(), vec!["x-3y7"]);
}

#[tokio::test(start_paused = true)]
async fn malformed_bodies_are_bad_requests() {
    let (gateway, mock) = ready_gateway().await;

    for body in [r#"{"x": 10}"#, r#"{"x": "a", "y": 1}"#, "x=1&y=2"] {
        let response = router(gateway.clone())
            .oneshot(post("/click", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].is_string());
    }
    assert!(mock.sent_codes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dispatch_failure_is_a_server_error() {
    let (gateway, mock) = ready_gateway().await;
    mock.fail_next_sends(1);

    let response = router(gateway)
        .oneshot(post("/move", r#"{"x": 1, "y": 1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["status"], "error");
}

#[tokio::test]
async fn status_reports_initialization_failure() {
    let gateway = Gateway::new(ArmConfig::default().gateway);
    let response = router(gateway.clone()).oneshot(get("/status")).await.unwrap();
    assert_eq!(json_body(response).await, json!({ "state": "uninitialized" }));

    gateway.initialize(async {
        Err(Error::Connection {
            attempts: 5,
            reason: "service unreachable".to_string(),
        })
    });
    let state = gateway.wait_initialized().await;
    assert!(matches!(state, GatewayState::Failed(_)));

    let response = router(gateway.clone()).oneshot(get("/status")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["state"], "failed");
    assert!(body["error"].as_str().unwrap().contains("5 attempts"));

    let response = router(gateway)
        .oneshot(post("/click", r#"{"x": 1, "y": 2}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(start_paused = true)]
async fn background_initialization_becomes_ready() {
    let config = ArmConfig::synthetic();
    let mock = Arc::new(MockActuatorService::new());
    let sessions = SessionManager::new(mock.clone(), config.actuator.clone());
    let gateway = Gateway::new(config.gateway.clone());

    let open_config = config.clone();
    gateway.initialize(async move { Rig::open_with(sessions, &open_config).await });
    assert_eq!(gateway.state(), GatewayState::Initializing);

    assert_eq!(gateway.wait_initialized().await, GatewayState::Ready);
    let response = router(gateway.clone()).oneshot(get("/status")).await.unwrap();
    assert_eq!(json_body(response).await, json!({ "state": "ready" }));

    gateway.shutdown().await;
    assert_eq!(gateway.state(), GatewayState::Shutdown);
    assert_eq!(mock.sent_codes(), vec!["0"]);
}

#[tokio::test(start_paused = true)]
async fn video_feed_streams_jpeg_parts_until_shutdown() {
    let (gateway, _mock) = ready_gateway().await;

    let response = router(gateway.clone())
        .oneshot(get("/video_feed"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let mut stream = response.into_body().into_data_stream();
    let part = stream.next().await.unwrap().unwrap();
    let head = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
    assert!(part.starts_with(head));
    assert_eq!(&part[head.len()..head.len() + 2], &[0xFF, 0xD8]);
    assert!(part.ends_with(&[0xFF, 0xD9, b'\r', b'\n']));

    gateway.shutdown().await;
    while let Some(chunk) = stream.next().await {
        chunk.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn video_feed_idles_until_ready() {
    let config = ArmConfig::synthetic();
    let (rig, _mock) = open_rig(&config).await;
    let gateway = Gateway::new(config.gateway.clone());

    let response = router(gateway.clone())
        .oneshot(get("/video_feed"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut stream = response.into_body().into_data_stream();

    // Nothing is sent while the hardware is still coming up
    assert!(tokio::time::timeout(Duration::from_secs(3), stream.next())
        .await
        .is_err());

    gateway.install(rig).await;
    let part = stream.next().await.unwrap().unwrap();
    assert!(part.starts_with(b"--frame\r\n"));

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn click_during_stream_is_serialized() {
    let (gateway, mock) = ready_gateway().await;

    let response = router(gateway.clone())
        .oneshot(get("/video_feed"))
        .await
        .unwrap();
    let mut stream = response.into_body().into_data_stream();
    let reader = tokio::spawn(async move {
        for _ in 0..20 {
            let part = stream.next().await.unwrap().unwrap();
            assert!(part.starts_with(b"--frame\r\n"));
        }
    });

    let response = router(gateway.clone())
        .oneshot(post("/click", r#"{"x": 1, "y": 2}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    reader.await.unwrap();
    assert_eq!(mock.sent_codes(), vec!["x1y2", "z9", "z-8"]);
    gateway.shutdown().await;
}
