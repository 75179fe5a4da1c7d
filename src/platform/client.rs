//! HTTP client for the hosting platform's deployment and log endpoints.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Deployment, LogSource, PlatformConfig, PlatformError, TimeWindow};
use crate::logs::unwrap_records;

pub const DEFAULT_DEPLOYMENT_LIMIT: usize = 8;
pub const MAX_DEPLOYMENT_LIMIT: usize = 100;
pub const DEFAULT_EVENT_LIMIT: usize = 2_500;
pub const MAX_EVENT_LIMIT: usize = 20_000;

const DEPLOYMENTS_PATH: [&str; 2] = ["v6", "deployments"];

/// Event endpoint shapes, newest first. `{id}` is the deployment id.
const EVENT_PATHS: [&str; 3] = [
    "v3/deployments/{id}/events",
    "v2/deployments/{id}/events",
    "v1/deployments/{id}/events",
];

pub fn clamp_deployment_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_DEPLOYMENT_LIMIT)
        .clamp(1, MAX_DEPLOYMENT_LIMIT)
}

pub fn clamp_event_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_EVENT_LIMIT).clamp(1, MAX_EVENT_LIMIT)
}

/// Read-only client for the platform API.
pub struct PlatformClient {
    http: Client,
    base_url: Url,
    config: PlatformConfig,
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> Result<Self, PlatformError> {
        let base_url = Url::parse(&config.api_base).map_err(|e| {
            PlatformError::Config(format!("invalid API base '{}': {}", config.api_base, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PlatformError::Config(format!(
                "API base '{}' cannot carry a path",
                config.api_base
            )));
        }

        let http = Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(concat!("deploywatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url, config })
    }

    /// READY deployments of the configured project, newest first as the
    /// platform returns them. Entries without an id are skipped.
    pub async fn list_deployments(
        &self,
        limit: Option<usize>,
        window: &TimeWindow,
    ) -> Result<Vec<Deployment>, PlatformError> {
        let limit = clamp_deployment_limit(limit);
        let mut query = vec![
            ("projectId", self.config.project_id.clone()),
            ("limit", limit.to_string()),
            ("state", "READY".to_string()),
        ];
        push_window(&mut query, "from", "to", window);

        let body = self.get_json(&DEPLOYMENTS_PATH, &query).await?;
        let entries = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("deployments") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        let total = entries.len();
        let deployments: Vec<Deployment> = entries
            .into_iter()
            .filter_map(parse_deployment)
            .take(limit)
            .collect();
        if deployments.len() < total.min(limit) {
            debug!(
                kept = deployments.len(),
                total, "dropped deployment entries without an id or not READY"
            );
        }
        info!(count = deployments.len(), "listed deployments");
        Ok(deployments)
    }

    /// Raw log/event records for one deployment, most recent first.
    ///
    /// Walks the known endpoint shapes in order. 400/404/405 move on to the
    /// next shape; any other failure is returned as-is.
    pub async fn list_deployment_events(
        &self,
        deployment_id: &str,
        limit: Option<usize>,
        window: &TimeWindow,
    ) -> Result<Vec<Value>, PlatformError> {
        let deployment_id = deployment_id.trim();
        if deployment_id.is_empty() {
            return Ok(Vec::new());
        }

        let limit = clamp_event_limit(limit);
        let mut query = vec![
            ("limit", limit.to_string()),
            ("direction", "backward".to_string()),
        ];
        push_window(&mut query, "since", "until", window);

        let mut last_err = None;
        for template in EVENT_PATHS {
            let segments: Vec<&str> = template
                .split('/')
                .map(|s| if s == "{id}" { deployment_id } else { s })
                .collect();

            match self.get_json(&segments, &query).await {
                Ok(body) => {
                    let mut events = unwrap_records(body);
                    events.truncate(limit);
                    debug!(%deployment_id, endpoint = template, count = events.len(), "fetched events");
                    return Ok(events);
                }
                Err(err) if err.is_endpoint_mismatch() => {
                    debug!(%deployment_id, endpoint = template, error = %err, "endpoint variant rejected, trying next");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            PlatformError::Config("no event endpoint variants configured".to_string())
        }))
    }

    async fn get_json(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Value, PlatformError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PlatformError::Config("API base cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        if let Some(team_id) = &self.config.team_id {
            url.query_pairs_mut().append_pair("teamId", team_id);
        }

        let request = self
            .http
            .get(url.clone())
            .bearer_auth(&self.config.token)
            .header(ACCEPT, "application/json");

        let timeout = self.config.timeout;
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            // Best effort: an unreadable body must not mask the status.
            let body = response.text().await.unwrap_or_default();
            Ok::<_, PlatformError>((status, body))
        };

        let (status, body) = match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(url = %redact(&url), timeout_ms = millis(timeout), "platform request timed out");
                return Err(PlatformError::Timeout {
                    url: redact(&url),
                    timeout_ms: millis(timeout),
                });
            }
        };

        if !status.is_success() {
            return Err(PlatformError::External {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| PlatformError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LogSource for PlatformClient {
    async fn list_deployments(
        &self,
        limit: Option<usize>,
        window: &TimeWindow,
    ) -> Result<Vec<Deployment>, PlatformError> {
        PlatformClient::list_deployments(self, limit, window).await
    }

    async fn list_deployment_events(
        &self,
        deployment_id: &str,
        limit: Option<usize>,
        window: &TimeWindow,
    ) -> Result<Vec<Value>, PlatformError> {
        PlatformClient::list_deployment_events(self, deployment_id, limit, window).await
    }
}

fn push_window(
    query: &mut Vec<(&'static str, String)>,
    start_key: &'static str,
    end_key: &'static str,
    window: &TimeWindow,
) {
    if let Some(start) = window.start {
        query.push((start_key, start.timestamp_millis().to_string()));
    }
    if let Some(end) = window.end {
        query.push((end_key, end.timestamp_millis().to_string()));
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// URL without its query string, for logs and error messages.
fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

fn parse_deployment(raw: Value) -> Option<Deployment> {
    let obj = raw.as_object()?;
    let id = ["uid", "id"]
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())?
        .to_string();

    let state = obj
        .get("state")
        .or_else(|| obj.get("readyState"))
        .and_then(Value::as_str);
    if matches!(state, Some(s) if !s.eq_ignore_ascii_case("READY")) {
        return None;
    }

    let created_at = ["createdAt", "created"]
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| v.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis));

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let name = text("name");
    let url = text("url");

    Some(Deployment {
        id,
        created_at,
        name,
        url,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config_for(base: &str, team_id: Option<&str>) -> PlatformConfig {
        PlatformConfig {
            token: "tok_test".to_string(),
            project_id: "prj_1".to_string(),
            team_id: team_id.map(str::to_string),
            timeout: Duration::from_millis(2_000),
            api_base: base.to_string(),
        }
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(clamp_deployment_limit(None), 8);
        assert_eq!(clamp_deployment_limit(Some(0)), 1);
        assert_eq!(clamp_deployment_limit(Some(500)), 100);
        assert_eq!(clamp_event_limit(None), 2_500);
        assert_eq!(clamp_event_limit(Some(0)), 1);
        assert_eq!(clamp_event_limit(Some(50_000)), 20_000);
    }

    #[test]
    fn test_parse_deployment_drops_missing_id() {
        assert!(parse_deployment(json!({"name": "web"})).is_none());
        assert!(parse_deployment(json!({"uid": "  "})).is_none());
        assert!(parse_deployment(json!("dpl_1")).is_none());
        assert!(parse_deployment(json!({"uid": "dpl_1", "state": "ERROR"})).is_none());

        let d = parse_deployment(json!({
            "uid": "dpl_1",
            "name": "web",
            "url": "web-abc.vercel.app",
            "createdAt": 1_700_000_000_000_i64,
            "state": "READY"
        }))
        .unwrap();
        assert_eq!(d.id, "dpl_1");
        assert_eq!(d.name.as_deref(), Some("web"));
        assert_eq!(d.created_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(d.raw["state"], "READY");
        assert_eq!(d.raw["uid"], "dpl_1");
    }

    #[test]
    fn test_invalid_base_is_config_error() {
        let err = PlatformClient::new(config_for("not a url", None)).err().unwrap();
        assert!(matches!(err, PlatformError::Config(_)));
    }

    #[tokio::test]
    async fn test_list_deployments_scoped_and_authorized() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v6/deployments")
            .match_header("authorization", "Bearer tok_test")
            .match_header("accept", "application/json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("projectId".into(), "prj_1".into()),
                Matcher::UrlEncoded("limit".into(), "8".into()),
                Matcher::UrlEncoded("state".into(), "READY".into()),
                Matcher::UrlEncoded("teamId".into(), "team_9".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"deployments": [
                    {"uid": "dpl_1", "name": "web"},
                    {"name": "orphan"},
                    {"uid": "dpl_2"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let client = PlatformClient::new(config_for(&server.url(), Some("team_9"))).unwrap();
        let deployments = client
            .list_deployments(None, &TimeWindow::default())
            .await
            .unwrap();

        mock.assert_async().await;
        let ids: Vec<&str> = deployments.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["dpl_1", "dpl_2"]);
    }

    #[tokio::test]
    async fn test_list_deployments_sends_window() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v6/deployments")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("from".into(), "1700000000000".into()),
                Matcher::UrlEncoded("to".into(), "1700003600000".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = PlatformClient::new(config_for(&server.url(), None)).unwrap();
        let window = TimeWindow::new(
            DateTime::from_timestamp(1_700_000_000, 0),
            DateTime::from_timestamp(1_700_003_600, 0),
        );
        let deployments = client.list_deployments(Some(3), &window).await.unwrap();
        mock.assert_async().await;
        assert!(deployments.is_empty());
    }

    #[tokio::test]
    async fn test_events_fall_back_after_404() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/v3/deployments/dpl_1/events")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v2/deployments/dpl_1/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "2500".into()),
                Matcher::UrlEncoded("direction".into(), "backward".into()),
            ]))
            .with_status(200)
            .with_body(json!({"events": [{"message": "a"}, {"message": "b"}]}).to_string())
            .create_async()
            .await;

        let client = PlatformClient::new(config_for(&server.url(), None)).unwrap();
        let events = client
            .list_deployment_events("dpl_1", None, &TimeWindow::default())
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["message"], "b");
    }

    #[tokio::test]
    async fn test_events_stop_on_non_fallback_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v3/deployments/dpl_1/events")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("{\"error\":\"forbidden\"}")
            .create_async()
            .await;
        let untouched = server
            .mock("GET", "/v2/deployments/dpl_1/events")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = PlatformClient::new(config_for(&server.url(), None)).unwrap();
        let err = client
            .list_deployment_events("dpl_1", None, &TimeWindow::default())
            .await
            .unwrap_err();

        untouched.assert_async().await;
        match err {
            PlatformError::External { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("forbidden"));
            }
            other => panic!("expected external error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_events_exhausted_returns_last_error() {
        let mut server = mockito::Server::new_async().await;
        for (path, status) in [
            ("/v3/deployments/dpl_1/events", 404),
            ("/v2/deployments/dpl_1/events", 405),
            ("/v1/deployments/dpl_1/events", 400),
        ] {
            server
                .mock("GET", path)
                .match_query(Matcher::Any)
                .with_status(status)
                .create_async()
                .await;
        }

        let client = PlatformClient::new(config_for(&server.url(), None)).unwrap();
        let err = client
            .list_deployment_events("dpl_1", Some(10), &TimeWindow::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_empty_deployment_id_skips_network() {
        // Nothing listens on this port; a request would fail.
        let client = PlatformClient::new(config_for("http://127.0.0.1:9", None)).unwrap();
        let events = client
            .list_deployment_events("  ", None, &TimeWindow::default())
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_event_fetch_times_out() {
        // Accept connections but never answer.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let mut config = config_for(&format!("http://{addr}"), None);
        config.timeout = Duration::from_millis(300);
        let client = PlatformClient::new(config).unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            client.list_deployment_events("dpl_1", None, &TimeWindow::default()),
        )
        .await
        .expect("client must give up on its own");

        match outcome {
            Err(PlatformError::Timeout { timeout_ms, url }) => {
                assert_eq!(timeout_ms, 300);
                assert!(url.contains("/v3/deployments/dpl_1/events"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        hold.abort();
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v6/deployments")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = PlatformClient::new(config_for(&server.url(), None)).unwrap();
        let err = client
            .list_deployments(None, &TimeWindow::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Decode(_)));
    }
}
