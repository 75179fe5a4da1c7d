//! Raw platform log records and their canonical, normalized form.

pub mod lookup;
pub mod normalize;

pub use self::normalize::normalize;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One log record in canonical shape, whatever field names the source used.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLogRecord {
    /// Owning deployment, supplied by the caller.
    pub deployment_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub request_id: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<u16>,
    /// Never empty.
    pub message: String,
    pub raw: serde_json::Value,
}

impl NormalizedLogRecord {
    /// Millisecond timestamp, with missing timestamps treated as the epoch.
    pub fn sort_millis(&self) -> i64 {
        self.timestamp.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

/// Pull the record list out of an events payload: a bare array, or an
/// object wrapping it under `events` or `logs`. Anything else is empty.
pub fn unwrap_records(body: serde_json::Value) -> Vec<serde_json::Value> {
    use serde_json::Value;

    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["events", "logs"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Normalize a batch of raw records belonging to one deployment.
pub fn normalize_batch(raw: &[serde_json::Value], deployment_id: &str) -> Vec<NormalizedLogRecord> {
    raw.iter().map(|r| normalize(r, deployment_id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_records_shapes() {
        assert_eq!(unwrap_records(json!([{"a": 1}])).len(), 1);
        assert_eq!(unwrap_records(json!({"events": [{}, {}]})).len(), 2);
        assert_eq!(unwrap_records(json!({"logs": [{}]})).len(), 1);
        assert!(unwrap_records(json!({"other": [{}]})).is_empty());
        assert!(unwrap_records(json!("nope")).is_empty());
    }

    #[test]
    fn test_normalize_batch_tags_deployment() {
        let batch = normalize_batch(&[json!({"message": "a"}), json!({})], "dpl_7");
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|r| r.deployment_id == "dpl_7"));
    }
}
