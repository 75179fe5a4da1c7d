//! Severity classification, fingerprinting, burst escalation and ranking.

pub mod burst;
pub mod classifier;
pub mod engine;
pub mod fingerprint;
pub mod rank;

pub use self::burst::{summarize_bursts, BurstSummary};
pub use self::engine::{classify_records, Classification, ClassificationStats};

use std::fmt;

use serde::{Serialize, Serializer};

use crate::logs::NormalizedLogRecord;

/// Severity of an emitted event. Declaration order is ranking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Severe,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Severe => write!(f, "severe"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Machine-readable reason attached to a classification decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Status5xx,
    FatalKeyword,
    Status4xx,
    WarningKeyword,
    Ignored,
    /// Member of a 4xx fingerprint group of this size.
    Burst4xx(usize),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Status5xx => write!(f, "status_5xx"),
            Reason::FatalKeyword => write!(f, "fatal_keyword"),
            Reason::Status4xx => write!(f, "status_4xx"),
            Reason::WarningKeyword => write!(f, "warning_keyword"),
            Reason::Ignored => write!(f, "ignored"),
            Reason::Burst4xx(n) => write!(f, "4xx_burst({})", n),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A normalized record that made it into the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedLogEvent {
    #[serde(flatten)]
    pub record: NormalizedLogRecord,
    pub severity: Severity,
    pub fingerprint: String,
    pub reason: Reason,
}
