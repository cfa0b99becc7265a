use serde::Deserialize;
use serde_json::Value;

use crate::coerce::coerce_text;

/// Only this command carries attendance logs.
pub const SENDLOG: &str = "sendlog";

/// Result of decoding one transport payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Not JSON at all.
    Invalid,
    /// Valid JSON, but not a `sendlog` message with a record list.
    Ignored,
    SendLog(InboundMessage),
}

/// A `sendlog` message as published by a terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub command: String,
    pub device_serial: Option<String>,
    pub records: Vec<RawRecord>,
    /// Message-level `cloudtime`, the fallback punch time.
    pub cloud_timestamp: Option<Value>,
    /// The full decoded message, kept for the audit payload.
    pub raw: Value,
}

/// One vendor log record. Every field is loosely typed on the wire; the
/// coercion rules in [`crate::coerce`] turn them into canonical values.
/// JSON `null` is treated the same as an absent field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default, rename = "enrollid")]
    pub enroll_id: Option<Value>,
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default)]
    pub inout: Option<Value>,
    #[serde(default)]
    pub mode: Option<Value>,
    #[serde(default)]
    pub event: Option<Value>,
    #[serde(default)]
    pub verifymode: Option<Value>,
    #[serde(default)]
    pub temp: Option<Value>,
    #[serde(default)]
    pub image: Option<Value>,
    #[serde(default)]
    pub sn: Option<Value>,
    #[serde(skip)]
    pub raw: Value,
}

impl RawRecord {
    /// Build a record from one element of the message's record list.
    /// Anything that is not an object yields a record with every field
    /// absent, which normalizes to identity 0 and is filtered later.
    pub fn from_value(value: Value) -> Self {
        let mut record = if value.is_object() {
            RawRecord::deserialize(&value).unwrap_or_default()
        } else {
            RawRecord::default()
        };
        record.raw = value;
        record
    }
}

impl InboundMessage {
    /// Structural guard: object, `cmd` (or `command`) equal to `sendlog`,
    /// and `record` (or `records`) holding a list.
    pub fn from_value(value: Value) -> Option<Self> {
        let object = value.as_object()?;

        let command = object
            .get("cmd")
            .or_else(|| object.get("command"))
            .and_then(Value::as_str)?;
        if command != SENDLOG {
            return None;
        }

        let records = object
            .get("record")
            .or_else(|| object.get("records"))
            .and_then(Value::as_array)?
            .iter()
            .cloned()
            .map(RawRecord::from_value)
            .collect();

        Some(Self {
            command: command.to_string(),
            device_serial: coerce_text(object.get("sn")),
            records,
            cloud_timestamp: object.get("cloudtime").filter(|v| !v.is_null()).cloned(),
            raw: value,
        })
    }
}

/// Parse raw payload bytes. Never fails: malformed input comes back as
/// [`Decoded::Invalid`] so one bad publish cannot stall the subscription.
pub fn decode(payload: &[u8]) -> Decoded {
    let text = String::from_utf8_lossy(payload);

    let value: Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(_) => return Decoded::Invalid,
    };

    match InboundMessage::from_value(value) {
        Some(message) => Decoded::SendLog(message),
        None => Decoded::Ignored,
    }
}
