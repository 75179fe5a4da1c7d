use std::cmp::Ordering;

use super::ClassifiedLogEvent;

/// Feed order: severity, then newest first, then fingerprint.
/// Missing timestamps count as the epoch and land last in their tier.
pub fn compare(a: &ClassifiedLogEvent, b: &ClassifiedLogEvent) -> Ordering {
    a.severity
        .cmp(&b.severity)
        .then_with(|| b.record.sort_millis().cmp(&a.record.sort_millis()))
        .then_with(|| a.fingerprint.cmp(&b.fingerprint))
}

pub fn rank(events: &mut [ClassifiedLogEvent]) {
    events.sort_by(compare);
}
