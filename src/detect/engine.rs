use serde::Serialize;
use tracing::{debug, info};

use crate::detect::burst::{summarize_bursts, BurstDetector, BurstSummary};
use crate::detect::classifier::{classify, Decision};
use crate::detect::fingerprint::fingerprint;
use crate::detect::rank::rank;
use crate::detect::{ClassifiedLogEvent, Severity};
use crate::logs::NormalizedLogRecord;

/// Bucket counts for one classification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationStats {
    pub total: usize,
    pub severe: usize,
    pub warning: usize,
    /// Deferred 4xx records that ended up escalated.
    pub escalated: usize,
    pub deferred: usize,
    pub dropped: usize,
}

/// Ranked feed plus what happened along the way.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub events: Vec<ClassifiedLogEvent>,
    pub bursts: Vec<BurstSummary>,
    pub stats: ClassificationStats,
}

/// Classify every record of one pass and return the ranked feed.
///
/// Burst grouping spans the whole input, so call this once per pass with
/// all records, never per fetch. `threshold` is clamped to [1, 1000].
pub fn classify_records(records: Vec<NormalizedLogRecord>, threshold: usize) -> Classification {
    let mut stats = ClassificationStats {
        total: records.len(),
        ..Default::default()
    };
    let mut events = Vec::new();
    let mut bursts = BurstDetector::new(threshold);

    for record in records {
        match classify(&record) {
            Decision::Emit { severity, reason } => {
                events.push(ClassifiedLogEvent {
                    fingerprint: fingerprint(&record),
                    record,
                    severity,
                    reason,
                });
            }
            Decision::Defer => {
                stats.deferred += 1;
                bursts.push(fingerprint(&record), record);
            }
            Decision::Drop => stats.dropped += 1,
        }
    }

    let escalated = bursts.finish();
    stats.escalated = escalated.len();
    stats.dropped += stats.deferred - stats.escalated;
    events.extend(escalated);

    rank(&mut events);
    let summaries = summarize_bursts(&events);

    stats.severe = events
        .iter()
        .filter(|e| e.severity == Severity::Severe)
        .count();
    stats.warning = events.len() - stats.severe;

    for burst in &summaries {
        debug!(fingerprint = %burst.fingerprint, count = burst.count, path = ?burst.path, "4xx burst escalated");
    }
    info!(
        total = stats.total,
        severe = stats.severe,
        warning = stats.warning,
        escalated = stats.escalated,
        dropped = stats.dropped,
        "classification complete"
    );

    Classification {
        events,
        bursts: summaries,
        stats,
    }
}
