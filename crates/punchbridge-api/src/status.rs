use axum::{Json, extract::State};
use chrono::Utc;
use punchbridge_types::api::{AdminStatusResponse, HealthResponse, MqttHealth};
use punchbridge_types::format_instant;

use crate::state::AppState;

/// GET /health — liveness plus broker connection state.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        mqtt: MqttHealth {
            url: state.mqtt_url.clone(),
            subscribed: state.mqtt_topic.clone(),
            connected: state.mqtt.is_connected(),
        },
        last_ingest: state.status.snapshot().as_ref().clone(),
        time: format_instant(&Utc::now()),
    })
}

/// GET /admin/status — the last ingest outcome, verbatim.
pub async fn admin_status(State(state): State<AppState>) -> Json<AdminStatusResponse> {
    Json(AdminStatusResponse {
        ok: true,
        last_ingest: state.status.snapshot().as_ref().clone(),
    })
}
