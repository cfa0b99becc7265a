//! Per-field coercion rules for loosely-typed vendor values.
//!
//! Every function is total: bad input maps to a fallback value, never an
//! error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Naive layouts terminals are known to send. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a timestamp value into an instant.
///
/// Strings may be RFC 3339 or one of [`NAIVE_FORMATS`] (or a bare date);
/// numbers are epoch milliseconds. Empty strings and everything else are
/// unusable.
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_instant_str(s.trim()),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}

fn parse_instant_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Punch time: record `time`, then message `cloudtime`, then `now`.
pub fn resolve_time(
    record_time: Option<&Value>,
    cloud_time: Option<&Value>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    record_time
        .and_then(parse_instant)
        .or_else(|| cloud_time.and_then(parse_instant))
        .unwrap_or(now)
}

// 2^63; floats at or past it saturate on cast
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Enrollment identity. Integral numbers are taken as-is (fractions are
/// truncated); strings contribute their leading digits. Absent or
/// unparsable values become 0, which marks a system event. So do numbers
/// outside the `i64` range.
pub fn coerce_enroll_id(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < I64_BOUND)
                    .map(|f| f.trunc() as i64)
            })
            .unwrap_or(0),
        Some(Value::String(s)) => parse_leading_int(s),
        _ => 0,
    }
}

fn parse_leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());

    match rest[..end].parse::<i64>() {
        Ok(n) if negative => -n,
        Ok(n) => n,
        Err(_) => 0,
    }
}

/// Numeric value of a field, or `None` when it is absent or not a number.
///
/// Booleans count as 1/0 and a blank string as 0, the same as the
/// terminals' own firmware tooling treats them.
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { 0.0 } else { s.parse::<f64>().ok()? }
        }
        _ => return None,
    };

    number.is_finite().then_some(number)
}

/// Flag fields (`inout`, `mode`, `event`, `verifymode`): integral numbers
/// only.
pub fn coerce_flag(value: Option<&Value>) -> Option<i64> {
    coerce_number(value)
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
        .map(|f| f as i64)
}

/// Measurements (`temp`).
pub fn coerce_measure(value: Option<&Value>) -> Option<f64> {
    coerce_number(value)
}

/// Text fields (`sn`, `image`): non-empty strings, or the rendering of a
/// number. Empty strings, booleans, objects and lists are dropped.
pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
