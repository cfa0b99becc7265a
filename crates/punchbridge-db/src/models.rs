//! Database row types, read back from SQLite as stored. Writes take
//! `CanonicalPunch` from punchbridge-types directly.

#[derive(Debug)]
pub struct DeviceRow {
    pub device_sn: String,
    pub store_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug)]
pub struct PunchRow {
    pub id: i64,
    pub device_sn: Option<String>,
    pub enrollid: i64,
    pub punch_time: String,
    pub inout: Option<i64>,
    pub mode: Option<i64>,
    pub event: Option<i64>,
    pub verifymode: Option<i64>,
    pub temp: Option<f64>,
    pub image_base64: Option<String>,
    pub raw_json: String,
}
