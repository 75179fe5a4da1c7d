use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Url;
use serde_json::Value;

use super::lookup::first_match;
use super::NormalizedLogRecord;

const MESSAGE_PATHS: &[&str] = &[
    "message",
    "text",
    "msg",
    "error.message",
    "payload.message",
    "data.message",
    "line",
];
const STATUS_PATHS: &[&str] = &[
    "statusCode",
    "status",
    "response.statusCode",
    "response.status",
    "http.status",
];
const PATH_PATHS: &[&str] = &[
    "path",
    "request.path",
    "request.url",
    "url",
    "req.path",
    "req.url",
];
const METHOD_PATHS: &[&str] = &["method", "request.method", "req.method", "http.method"];
const REQUEST_ID_PATHS: &[&str] = &[
    "requestId",
    "request.id",
    "req.id",
    "id",
    "traceId",
    "request_id",
];
const TIMESTAMP_PATHS: &[&str] = &["timestamp", "time", "createdAt", "created", "date", "ts"];

/// Epoch values above this are milliseconds, at or below it seconds.
pub const EPOCH_MILLIS_CUTOFF: f64 = 2_000_000_000.0;

pub const MAX_FALLBACK_MESSAGE_CHARS: usize = 600;
pub const EMPTY_MESSAGE_PLACEHOLDER: &str = "(empty log record)";

/// Build the canonical record. Never fails: every field that cannot be
/// resolved or validated is left empty.
pub fn normalize(raw: &Value, deployment_id: &str) -> NormalizedLogRecord {
    NormalizedLogRecord {
        deployment_id: deployment_id.to_string(),
        timestamp: first_match(raw, TIMESTAMP_PATHS, parse_timestamp),
        request_id: first_match(raw, REQUEST_ID_PATHS, parse_request_id),
        path: first_match(raw, PATH_PATHS, parse_path),
        method: first_match(raw, METHOD_PATHS, parse_method),
        status_code: first_match(raw, STATUS_PATHS, parse_status_code),
        message: first_match(raw, MESSAGE_PATHS, parse_message)
            .unwrap_or_else(|| fallback_message(raw)),
        raw: raw.clone(),
    }
}

fn non_blank(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_message(value: &Value) -> Option<String> {
    non_blank(value).map(str::to_string)
}

fn parse_status_code(value: &Value) -> Option<u16> {
    let code = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (100..=599).contains(&code).then_some(code as u16)
}

fn parse_method(value: &Value) -> Option<String> {
    let method = non_blank(value)?.to_ascii_uppercase();
    method
        .chars()
        .all(|c| c.is_ascii_alphabetic())
        .then_some(method)
}

fn parse_request_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        other => non_blank(other).map(str::to_string),
    }
}

/// Reduce a path or URL to its bare path: no host, no query, no fragment.
pub fn normalize_path(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(input) {
        if url.has_host() {
            return Some(url.path().to_string());
        }
    }

    let bare = input
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    if bare.is_empty() {
        return None;
    }
    if bare.starts_with('/') {
        Some(bare.to_string())
    } else {
        Some(format!("/{bare}"))
    }
}

fn parse_path(value: &Value) -> Option<String> {
    normalize_path(non_blank(value)?)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// Seconds unless the value exceeds [`EPOCH_MILLIS_CUTOFF`].
pub fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value > EPOCH_MILLIS_CUTOFF {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        let secs = value.trunc() as i64;
        let nanos = (value.fract() * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

fn parse_timestamp_str(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<f64>() {
        return from_epoch(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn fallback_message(raw: &Value) -> String {
    let rendered = serde_json::to_string(raw).unwrap_or_default();
    if matches!(rendered.trim(), "" | "{}" | "[]" | "null" | "\"\"") {
        return EMPTY_MESSAGE_PLACEHOLDER.to_string();
    }
    if rendered.chars().count() > MAX_FALLBACK_MESSAGE_CHARS {
        let mut clipped: String = rendered.chars().take(MAX_FALLBACK_MESSAGE_CHARS).collect();
        clipped.push('…');
        clipped
    } else {
        rendered
    }
}
