//! Hosting-platform API access -- credentials, deployments, raw log events.

pub mod client;
pub mod config;

pub use self::client::PlatformClient;
pub use self::config::PlatformConfig;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the platform client.
///
/// `Config` is a setup problem and is never worth retrying; everything else
/// is an external failure the caller may retry by re-running the pass.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("platform returned HTTP {status}: {body}")]
    External { status: u16, body: String },

    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode platform response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Whether re-running the pass could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PlatformError::Config(_))
    }

    /// HTTP status carried by an external error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::External { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 400/404/405 mean "this API shape is not served here", so the next
    /// endpoint variant is worth a try.
    pub(crate) fn is_endpoint_mismatch(&self) -> bool {
        matches!(self.status(), Some(400 | 404 | 405))
    }
}

/// Longest look-back a pass may ask for: 30 days.
pub const MAX_WINDOW_MINUTES: i64 = 43_200;

pub fn clamp_window_minutes(minutes: i64) -> i64 {
    minutes.clamp(1, MAX_WINDOW_MINUTES)
}

/// Optional creation-time bounds for a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// The `minutes` leading up to `end`, with `minutes` clamped to
    /// [1, [`MAX_WINDOW_MINUTES`]].
    pub fn trailing(end: DateTime<Utc>, minutes: i64) -> Self {
        let span = chrono::Duration::minutes(clamp_window_minutes(minutes));
        Self {
            start: Some(end.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)),
            end: Some(end),
        }
    }
}

/// A READY production deployment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub url: Option<String>,
    /// Fields not otherwise modeled.
    #[serde(skip_serializing)]
    pub raw: serde_json::Value,
}

/// Anything that can hand out deployments and their raw log records.
///
/// Implemented by [`PlatformClient`]; the pass orchestration and the HTTP
/// surface only depend on this trait.
#[async_trait::async_trait]
pub trait LogSource: Send + Sync {
    async fn list_deployments(
        &self,
        limit: Option<usize>,
        window: &TimeWindow,
    ) -> Result<Vec<Deployment>, PlatformError>;

    async fn list_deployment_events(
        &self,
        deployment_id: &str,
        limit: Option<usize>,
        window: &TimeWindow,
    ) -> Result<Vec<serde_json::Value>, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(!PlatformError::Config("missing token".into()).is_retryable());
        assert!(PlatformError::External { status: 502, body: String::new() }.is_retryable());
        assert!(PlatformError::Timeout { url: "x".into(), timeout_ms: 2000 }.is_retryable());
    }

    #[test]
    fn test_endpoint_mismatch_statuses() {
        for status in [400, 404, 405] {
            let err = PlatformError::External { status, body: String::new() };
            assert!(err.is_endpoint_mismatch(), "{status} should fall through");
        }
        for status in [401, 403, 429, 500] {
            let err = PlatformError::External { status, body: String::new() };
            assert!(!err.is_endpoint_mismatch(), "{status} should stop");
        }
    }

    #[test]
    fn test_trailing_window() {
        let end = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let window = TimeWindow::trailing(end, 60);
        assert_eq!(window.end, Some(end));
        assert_eq!(window.start.unwrap().timestamp(), 1_700_000_000 - 3600);
    }

    #[test]
    fn test_trailing_window_clamps_extremes() {
        let end = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        for minutes in [i64::MAX, 1_000_000_000_000, MAX_WINDOW_MINUTES + 1] {
            let window = TimeWindow::trailing(end, minutes);
            assert_eq!(
                window.start.unwrap().timestamp(),
                1_700_000_000 - MAX_WINDOW_MINUTES * 60
            );
        }
        for minutes in [i64::MIN, -5, 0] {
            let window = TimeWindow::trailing(end, minutes);
            assert_eq!(window.start.unwrap().timestamp(), 1_700_000_000 - 60);
        }
    }
}
