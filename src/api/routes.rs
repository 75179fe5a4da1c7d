//! API route definitions.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::pipeline::{run_pass, PassOptions};
use crate::platform::PlatformError;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/feed", get(feed))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

#[derive(Debug, Default, Deserialize)]
struct FeedQuery {
    threshold: Option<usize>,
    deployments: Option<usize>,
    window_minutes: Option<i64>,
}

async fn feed(State(state): State<AppState>, Query(query): Query<FeedQuery>) -> Response {
    let mut settings = state.pipeline.clone();
    if let Some(threshold) = query.threshold {
        settings.burst_threshold = threshold;
    }
    if let Some(limit) = query.deployments {
        settings.deployment_limit = limit;
    }
    if let Some(minutes) = query.window_minutes {
        settings.window_minutes = minutes;
    }

    let options = PassOptions::from_settings(&settings, chrono::Utc::now());
    match run_pass(state.source.as_ref(), &options).await {
        Ok(report) => {
            let meta = json!({
                "total": report.events.len(),
                "quiet": report.is_quiet(),
                "partial": report.is_partial(),
                "timestamp": report.generated_at.to_rfc3339(),
                "version": env!("CARGO_PKG_VERSION")
            });
            Json(json!({ "data": report, "meta": meta })).into_response()
        }
        Err(err) => platform_error(&err),
    }
}

fn platform_error(err: &PlatformError) -> Response {
    let (status, message) = match err {
        PlatformError::Config(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "platform integration is not configured",
        ),
        _ => (StatusCode::BAD_GATEWAY, "could not reach platform"),
    };
    tracing::warn!(error = %err, %status, "feed request failed");
    let body = json!({
        "error": {
            "message": message,
            "detail": err.to_string(),
            "retryable": err.is_retryable()
        }
    });
    (status, Json(body)).into_response()
}
