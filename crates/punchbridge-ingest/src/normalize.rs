use chrono::{DateTime, Utc};
use punchbridge_types::CanonicalPunch;
use serde_json::json;

use crate::coerce::{coerce_enroll_id, coerce_flag, coerce_measure, coerce_text, resolve_time};
use crate::decode::{InboundMessage, RawRecord};

/// Map one vendor record into a canonical punch, using the current time as
/// the last-resort punch time.
pub fn normalize(
    device_serial_hint: Option<&str>,
    message: &InboundMessage,
    record: &RawRecord,
) -> CanonicalPunch {
    normalize_at(device_serial_hint, message, record, Utc::now())
}

/// Same as [`normalize`] with an explicit `now`.
///
/// Never fails and never drops anything: identity 0 and the image are left
/// for the batch filter to deal with.
pub fn normalize_at(
    device_serial_hint: Option<&str>,
    message: &InboundMessage,
    record: &RawRecord,
    now: DateTime<Utc>,
) -> CanonicalPunch {
    let device_serial = device_serial_hint
        .filter(|sn| !sn.is_empty())
        .map(str::to_string)
        .or_else(|| coerce_text(record.sn.as_ref()))
        .or_else(|| message.device_serial.clone());

    CanonicalPunch {
        device_serial,
        enroll_id: coerce_enroll_id(record.enroll_id.as_ref()),
        punch_time: resolve_time(record.time.as_ref(), message.cloud_timestamp.as_ref(), now),
        inout: coerce_flag(record.inout.as_ref()),
        mode: coerce_flag(record.mode.as_ref()),
        event: coerce_flag(record.event.as_ref()),
        verifymode: coerce_flag(record.verifymode.as_ref()),
        temp: coerce_measure(record.temp.as_ref()),
        image_payload: coerce_text(record.image.as_ref()),
        raw_payload: json!({ "msg": message.raw, "rec": record.raw }),
    }
}
