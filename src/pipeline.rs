//! One classification pass: deployments, their events, one ranked feed.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::detect::burst::{clamp_threshold, BurstSummary};
use crate::detect::{classify_records, ClassificationStats, ClassifiedLogEvent};
use crate::logs::normalize_batch;
use crate::platform::client::{clamp_deployment_limit, clamp_event_limit};
use crate::platform::{Deployment, LogSource, PlatformError, TimeWindow};
use crate::settings::PipelineSettings;

/// Knobs for a single pass. Values are clamped when the pass runs.
#[derive(Debug, Clone)]
pub struct PassOptions {
    pub burst_threshold: usize,
    pub deployment_limit: usize,
    pub event_limit: usize,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
}

impl PassOptions {
    /// Options for a pass ending at `now`.
    pub fn from_settings(settings: &PipelineSettings, now: DateTime<Utc>) -> Self {
        let window = TimeWindow::trailing(now, settings.window_minutes);
        Self {
            burst_threshold: settings.burst_threshold,
            deployment_limit: settings.deployment_limit,
            event_limit: settings.event_limit,
            window_start: window.start,
            window_end: window.end,
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.window_start, self.window_end)
    }
}

/// A deployment whose events could not be fetched this pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentFailure {
    pub deployment_id: String,
    pub error: String,
    pub status: Option<u16>,
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub pass_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub deployments: Vec<Deployment>,
    pub events: Vec<ClassifiedLogEvent>,
    pub bursts: Vec<BurstSummary>,
    pub failures: Vec<DeploymentFailure>,
    pub stats: ClassificationStats,
}

impl PassReport {
    /// No incidents in the window. Not an error.
    pub fn is_quiet(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Run one pass against `source`.
///
/// Listing deployments is pass-fatal. A failed event fetch only removes
/// that deployment's slice and is reported in [`PassReport::failures`].
/// Classification waits for every fetch so bursts see the whole pass.
pub async fn run_pass(
    source: &dyn LogSource,
    options: &PassOptions,
) -> Result<PassReport, PlatformError> {
    let pass_id = Uuid::new_v4();
    let span = info_span!("pass", %pass_id);

    async move {
        let threshold = clamp_threshold(Some(options.burst_threshold));
        let deployment_limit = clamp_deployment_limit(Some(options.deployment_limit));
        let event_limit = clamp_event_limit(Some(options.event_limit));
        let window = options.window();

        info!(threshold, deployment_limit, event_limit, "starting classification pass");
        let deployments = source
            .list_deployments(Some(deployment_limit), &window)
            .await?;

        let fetches = deployments.iter().map(|deployment| async move {
            let result = source
                .list_deployment_events(&deployment.id, Some(event_limit), &window)
                .await;
            (deployment.id.as_str(), result)
        });

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (deployment_id, result) in join_all(fetches).await {
            match result {
                Ok(raw) => {
                    info!(%deployment_id, count = raw.len(), "fetched deployment events");
                    records.extend(normalize_batch(&raw, deployment_id));
                }
                Err(err) => {
                    warn!(%deployment_id, error = %err, "failed to fetch deployment events");
                    failures.push(DeploymentFailure {
                        deployment_id: deployment_id.to_string(),
                        status: err.status(),
                        retryable: err.is_retryable(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let classification = classify_records(records, threshold);

        Ok(PassReport {
            pass_id,
            generated_at: Utc::now(),
            window_start: window.start,
            window_end: window.end,
            deployments,
            events: classification.events,
            bursts: classification.bursts,
            failures,
            stats: classification.stats,
        })
    }
    .instrument(span)
    .await
}
