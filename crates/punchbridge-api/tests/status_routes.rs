use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use punchbridge_api::{AppStateInner, router};
use punchbridge_ingest::{ConnectionState, StatusTracker};
use punchbridge_types::IngestStatus;

const TOKEN: &str = "k7Qv2rX9pLm4";

fn app() -> (axum::Router, StatusTracker, ConnectionState) {
    let status = StatusTracker::new();
    let mqtt = ConnectionState::default();
    let state = Arc::new(AppStateInner {
        status: status.clone(),
        mqtt: mqtt.clone(),
        mqtt_url: "mqtt://broker.local:1883".into(),
        mqtt_topic: "aiface/+/sub".into(),
        admin_token: TOKEN.into(),
    });
    (router(state), status, mqtt)
}

async fn get(app: axum::Router, uri: &str, auth: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(auth) = auth {
        request = request.header(header::AUTHORIZATION, auth);
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_is_public_and_reports_connection() {
    let (app, _status, mqtt) = app();
    mqtt.set_connected(true);

    let (code, body) = get(app, "/health", None).await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["mqtt"]["url"], "mqtt://broker.local:1883");
    assert_eq!(body["mqtt"]["subscribed"], "aiface/+/sub");
    assert_eq!(body["mqtt"]["connected"], true);
    assert_eq!(body["lastIngest"]["insertedCount"], 0);
    assert!(body["lastIngest"]["timestamp"].is_null());
    assert!(body["time"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn admin_status_requires_token() {
    let (app, _, _) = app();
    let (code, body) = get(app, "/admin/status", None).await;
    assert_eq!(code, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn admin_status_rejects_wrong_token_and_scheme() {
    let (app, _, _) = app();
    let (code, _) = get(app.clone(), "/admin/status", Some("Bearer wrong")).await;
    assert_eq!(code, StatusCode::UNAUTHORIZED);

    let (code, _) = get(app.clone(), "/admin/status", Some(TOKEN)).await;
    assert_eq!(code, StatusCode::UNAUTHORIZED);

    let (code, _) = get(app, "/admin/status", Some(&format!("bearer {}", TOKEN))).await;
    assert_eq!(code, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_status_returns_last_snapshot() {
    let (app, status, _) = app();
    status.record(IngestStatus::failure(Some("DEV1".into()), "connection reset"));

    let (code, body) = get(app, "/admin/status", Some(&format!("Bearer {}", TOKEN))).await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["lastIngest"]["deviceSerial"], "DEV1");
    assert_eq!(body["lastIngest"]["insertedCount"], 0);
    assert_eq!(body["lastIngest"]["error"], "connection reset");
    assert!(body["lastIngest"]["timestamp"].is_string());
}
