//! Escalation of repeated 4xx records.
//!
//! A lone 4xx is ordinary client behaviour. A group of records sharing one
//! fingerprint that reaches the threshold within a pass is escalated as a
//! whole: every member is emitted as a warning. Smaller groups vanish.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::{ClassifiedLogEvent, Reason, Severity};
use crate::logs::NormalizedLogRecord;

pub const DEFAULT_BURST_THRESHOLD: usize = 20;
pub const MAX_BURST_THRESHOLD: usize = 1_000;

pub fn clamp_threshold(threshold: Option<usize>) -> usize {
    threshold
        .unwrap_or(DEFAULT_BURST_THRESHOLD)
        .clamp(1, MAX_BURST_THRESHOLD)
}

/// Compact view of one escalated group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstSummary {
    pub fingerprint: String,
    pub count: usize,
    pub status_code: Option<u16>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub sample_message: String,
}

/// Per-pass accumulator of deferred records, keyed by fingerprint.
#[derive(Debug)]
pub struct BurstDetector {
    threshold: usize,
    groups: BTreeMap<String, Vec<NormalizedLogRecord>>,
}

impl BurstDetector {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.clamp(1, MAX_BURST_THRESHOLD),
            groups: BTreeMap::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn push(&mut self, fingerprint: String, record: NormalizedLogRecord) {
        self.groups.entry(fingerprint).or_default().push(record);
    }

    /// Resolve every group. Members of groups at or over the threshold come
    /// back as warnings; the rest are dropped.
    pub fn finish(self) -> Vec<ClassifiedLogEvent> {
        let mut events = Vec::new();

        for (fingerprint, members) in self.groups {
            let count = members.len();
            if count < self.threshold {
                debug!(%fingerprint, count, threshold = self.threshold, "4xx group below threshold, dropped");
                continue;
            }

            events.extend(members.into_iter().map(|record| ClassifiedLogEvent {
                record,
                severity: Severity::Warning,
                fingerprint: fingerprint.clone(),
                reason: Reason::Burst4xx(count),
            }));
        }

        events
    }
}

/// One summary per escalated group found in `events`, ordered by fingerprint.
///
/// The sample fields come from the first member seen. Events escalated for
/// any other reason are ignored.
pub fn summarize_bursts(events: &[ClassifiedLogEvent]) -> Vec<BurstSummary> {
    let mut groups: BTreeMap<&str, BurstSummary> = BTreeMap::new();

    for event in events {
        if !matches!(event.reason, Reason::Burst4xx(_)) {
            continue;
        }
        groups
            .entry(event.fingerprint.as_str())
            .and_modify(|summary| summary.count += 1)
            .or_insert_with(|| BurstSummary {
                fingerprint: event.fingerprint.clone(),
                count: 1,
                status_code: event.record.status_code,
                method: event.record.method.clone(),
                path: event.record.path.clone(),
                sample_message: event.record.message.clone(),
            });
    }

    groups.into_values().collect()
}
