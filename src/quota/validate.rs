use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde_json::Value;

use crate::quota::reading::{QuotaReading, SessionQuota, WeeklyQuota};

const MAX_CLOCK_SKEW_MINUTES: i64 = 5;
// Serialized timestamps carry milliseconds; readings are held at the same precision.
const TIMESTAMP_SUBSEC_DIGITS: u16 = 3;

/// Maps any decoded JSON value onto a complete [`QuotaReading`].
///
/// Total by construction: missing sections, wrong types and out-of-range
/// percentages degrade to `null`/empty fields. `fallback_captured_at` is used
/// unless the input carries a plausible RFC 3339 `captured_at`.
pub fn validate(raw: &Value, fallback_captured_at: DateTime<Utc>) -> QuotaReading {
    let fallback_captured_at = fallback_captured_at.trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS);
    let mut reading = QuotaReading::empty(fallback_captured_at);
    let Some(root) = raw.as_object() else {
        return reading;
    };

    reading.captured_at = plausible_timestamp(root.get("captured_at"), fallback_captured_at);

    if let Some(current) = root.get("current_session").and_then(Value::as_object) {
        reading.current_session = SessionQuota {
            percent_used: coerce_percent(current.get("percent_used")),
            resets_in: coerce_string(current.get("resets_in")),
        };
    }

    if let Some(weekly) = root.get("weekly_limits").and_then(Value::as_object) {
        reading.weekly_limits = WeeklyQuota {
            percent_used: coerce_percent(weekly.get("percent_used")),
            resets: coerce_string(weekly.get("resets")),
        };
    }

    reading
}

fn coerce_percent(value: Option<&Value>) -> Option<u8> {
    let num = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim_end().parse::<f64>().ok()?,
        _ => return None,
    };
    if !num.is_finite() || !(0.0..=100.0).contains(&num) {
        return None;
    }
    Some(num.round() as u8)
}

fn coerce_string(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

fn plausible_timestamp(value: Option<&Value>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let latest = fallback + TimeDelta::minutes(MAX_CLOCK_SKEW_MINUTES);
    value
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
        .map(|ts| ts.with_timezone(&Utc).trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS))
        .filter(|ts| *ts <= latest)
        .unwrap_or(fallback)
}
