use serde::Serialize;

use crate::models::IngestStatus;

// -- Health --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub mqtt: MqttHealth,
    pub last_ingest: IngestStatus,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct MqttHealth {
    pub url: String,
    pub subscribed: String,
    pub connected: bool,
}

// -- Admin --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusResponse {
    pub ok: bool,
    pub last_ingest: IngestStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
