//! deploywatch -- severity triage for production deployment logs.
//!
//! Pulls raw log records for recent deployments from the hosting platform,
//! normalizes them, classifies severity, escalates repeated 4xx bursts and
//! returns one ranked feed for on-call review.

pub mod api;
pub mod detect;
pub mod logs;
pub mod pipeline;
pub mod platform;
pub mod settings;

use std::sync::Arc;

use anyhow::{Context, Result};

/// Start the HTTP surface serving the ranked feed.
pub async fn serve(bind: &str, settings: settings::Settings) -> Result<()> {
    // Fail before binding if credentials are missing.
    let config = platform::PlatformConfig::from_env()?;
    tracing::info!(?config, "platform configuration resolved");
    let client = platform::PlatformClient::new(config)?;

    let state = api::state::AppState {
        source: Arc::new(client),
        pipeline: settings.pipeline,
    };
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {bind}"))?;
    tracing::info!(%addr, "deploywatch listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
