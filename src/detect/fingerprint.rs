//! Stable fingerprints for grouping equivalent log records.
//!
//! A fingerprint depends only on status, method, path and the message with
//! its volatile tokens (UUIDs, integers, URLs) masked, so the same failure
//! seen with different request ids or timestamps groups together.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::logs::NormalizedLogRecord;

pub const FINGERPRINT_HEX_LEN: usize = 16;
pub const MAX_CANONICAL_MESSAGE_CHARS: usize = 180;

const UUID_TOKEN: &str = "<uuid>";
const NUMBER_TOKEN: &str = "<n>";
const URL_TOKEN: &str = "<url>";

fn uuid_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("uuid pattern")
    })
}

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+\b").expect("number pattern"))
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("url pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

/// Lower-case, mask volatile tokens, collapse whitespace, bound the length.
pub fn canonicalize_message(message: &str) -> String {
    let lowered = message.to_lowercase();
    let masked = uuid_pattern().replace_all(&lowered, UUID_TOKEN);
    let masked = number_pattern().replace_all(&masked, NUMBER_TOKEN);
    let masked = url_pattern().replace_all(&masked, URL_TOKEN);
    let collapsed = whitespace_pattern().replace_all(&masked, " ");
    collapsed
        .trim()
        .chars()
        .take(MAX_CANONICAL_MESSAGE_CHARS)
        .collect()
}

/// The exact string that gets hashed.
pub fn canonical_base(record: &NormalizedLogRecord) -> String {
    let status = record
        .status_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "status:{}|method:{}|path:{}|msg:{}",
        status,
        record.method.as_deref().unwrap_or("-"),
        record.path.as_deref().unwrap_or("-"),
        canonicalize_message(&record.message)
    )
}

/// First [`FINGERPRINT_HEX_LEN`] hex chars of SHA-256 over the canonical base.
pub fn fingerprint(record: &NormalizedLogRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_base(record).as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..FINGERPRINT_HEX_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::normalize;
    use serde_json::json;

    fn fp(raw: serde_json::Value) -> String {
        fingerprint(&normalize(&raw, "dpl_1"))
    }

    #[test]
    fn test_canonicalize_masks_volatile_tokens() {
        assert_eq!(
            canonicalize_message("User 123 failed   at https://api.example.com/v1/x?y=2 id 3F2504E0-4F89-11D3-9A0C-0305E82C3301"),
            "user <n> failed at <url> id <uuid>"
        );
        assert_eq!(canonicalize_message("  Hello\n\tWorld  "), "hello world");
    }

    #[test]
    fn test_canonicalize_is_bounded() {
        let long = "word ".repeat(200);
        assert_eq!(canonicalize_message(&long).chars().count(), MAX_CANONICAL_MESSAGE_CHARS);
    }

    #[test]
    fn test_fingerprint_shape_and_determinism() {
        let raw = json!({"status": 404, "method": "GET", "path": "/x", "message": "nope"});
        let a = fp(raw.clone());
        assert_eq!(a.len(), FINGERPRINT_HEX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, fp(raw));
    }

    #[test]
    fn test_fingerprint_ignores_non_distinguishing_fields() {
        let a = fp(json!({"status": 404, "path": "/x", "message": "m", "requestId": "r1", "timestamp": 1}));
        let b = fp(json!({"status": 404, "path": "/x", "message": "m", "requestId": "r2", "timestamp": 2}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_masks_numbers_uuids_urls() {
        let a = fp(json!({"status": 500, "message": "order 1001 failed for 550e8400-e29b-41d4-a716-446655440000 via https://a.example/x"}));
        let b = fp(json!({"status": 500, "message": "order 77 failed for 123e4567-e89b-12d3-a456-426614174000 via http://b.example/y/z"}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_separates_distinguishing_fields() {
        let base = fp(json!({"status": 404, "method": "GET", "path": "/x", "message": "m"}));
        assert_ne!(base, fp(json!({"status": 410, "method": "GET", "path": "/x", "message": "m"})));
        assert_ne!(base, fp(json!({"status": 404, "method": "POST", "path": "/x", "message": "m"})));
        assert_ne!(base, fp(json!({"status": 404, "method": "GET", "path": "/y", "message": "m"})));
        assert_ne!(base, fp(json!({"status": 404, "method": "GET", "path": "/x", "message": "n"})));
    }

    #[test]
    fn test_canonical_base_format() {
        let record = normalize(&json!({"message": "Boom 42"}), "dpl_1");
        assert_eq!(canonical_base(&record), "status:-|method:-|path:-|msg:boom <n>");
    }
}
