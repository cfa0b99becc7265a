use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// One attendance event, normalized from a vendor log record.
///
/// Anything that reaches the store has `enroll_id > 0`; the batch filter
/// enforces that before persistence, the store does not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPunch {
    pub device_serial: Option<String>,
    pub enroll_id: i64,
    #[serde(serialize_with = "serialize_instant")]
    pub punch_time: DateTime<Utc>,
    pub inout: Option<i64>,
    pub mode: Option<i64>,
    pub event: Option<i64>,
    pub verifymode: Option<i64>,
    pub temp: Option<f64>,
    pub image_payload: Option<String>,
    /// `{"msg": <message>, "rec": <record>}` kept verbatim for audit.
    pub raw_payload: serde_json::Value,
}

impl CanonicalPunch {
    pub fn punch_time_iso(&self) -> String {
        format_instant(&self.punch_time)
    }
}

/// Most recent reportable ingest outcome.
///
/// `Default` is the state before anything has been ingested since start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStatus {
    #[serde(serialize_with = "serialize_optional_instant")]
    pub timestamp: Option<DateTime<Utc>>,
    pub device_serial: Option<String>,
    pub inserted_count: usize,
    pub error: Option<String>,
}

impl IngestStatus {
    pub fn success(device_serial: Option<String>, inserted_count: usize) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            device_serial,
            inserted_count,
            error: None,
        }
    }

    pub fn failure(device_serial: Option<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            device_serial,
            inserted_count: 0,
            error: Some(error.into()),
        }
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_instant<S: Serializer>(instant: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_instant(instant))
}

fn serialize_optional_instant<S: Serializer>(
    instant: &Option<DateTime<Utc>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match instant {
        Some(instant) => s.serialize_str(&format_instant(instant)),
        None => s.serialize_none(),
    }
}
