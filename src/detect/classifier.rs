//! Rule-ordered severity decision for a single record.

use std::sync::OnceLock;

use regex::Regex;

use super::{Reason, Severity};
use crate::logs::NormalizedLogRecord;

/// Outcome of the first matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Surface immediately.
    Emit { severity: Severity, reason: Reason },
    /// 4xx: held back for burst analysis.
    Defer,
    /// Nothing worth surfacing.
    Drop,
}

impl Decision {
    pub fn reason(&self) -> Reason {
        match self {
            Decision::Emit { reason, .. } => *reason,
            Decision::Defer => Reason::Status4xx,
            Decision::Drop => Reason::Ignored,
        }
    }
}

fn fatal_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)uncaught|unhandled|fatal|panic|timeout|out of memory|segmentation fault")
            .expect("fatal keyword pattern")
    })
}

fn warning_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)retry|retrying|recoverable|degraded|non[- ]?fatal|rate[- _]?limit|throttl")
            .expect("warning keyword pattern")
    })
}

// "non-fatal" must not trip the fatal rule.
fn non_fatal_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)non[- ]?fatal").expect("non-fatal pattern"))
}

pub fn has_fatal_keyword(message: &str) -> bool {
    let scrubbed = non_fatal_pattern().replace_all(message, " ");
    fatal_pattern().is_match(&scrubbed)
}

pub fn has_warning_keyword(message: &str) -> bool {
    warning_pattern().is_match(message)
}

/// Apply the rules in priority order; the first match decides.
pub fn classify(record: &NormalizedLogRecord) -> Decision {
    let status = record.status_code;

    if matches!(status, Some(code) if code >= 500) {
        return Decision::Emit {
            severity: Severity::Severe,
            reason: Reason::Status5xx,
        };
    }
    if has_fatal_keyword(&record.message) {
        return Decision::Emit {
            severity: Severity::Severe,
            reason: Reason::FatalKeyword,
        };
    }
    if matches!(status, Some(400..=499)) {
        return Decision::Defer;
    }
    if has_warning_keyword(&record.message) {
        return Decision::Emit {
            severity: Severity::Warning,
            reason: Reason::WarningKeyword,
        };
    }
    Decision::Drop
}
