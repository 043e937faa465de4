//! Records handed to a log sink.

use crate::domain::identity::CallSite;
use crate::domain::severity::Severity;
use std::fmt;
use std::time::Instant;

/// One log emission, borrowed from the caller for the duration of the sink
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord<'a> {
    /// Severity of the call
    pub severity: Severity,
    /// Message text as supplied by the caller
    pub message: &'a str,
    /// Monotonic timestamp sampled once for the call
    pub timestamp: Instant,
    /// Whether the call went through the throttle cache
    pub throttled: bool,
    /// Location of the log statement, when known
    pub call_site: Option<CallSite>,
    /// Meant for the local console only, not for remote operators
    pub local: bool,
}

impl<'a> LogRecord<'a> {
    /// Create a record.
    pub fn new(severity: Severity, message: &'a str, timestamp: Instant) -> Self {
        Self {
            severity,
            message,
            timestamp,
            throttled: false,
            call_site: None,
            local: false,
        }
    }

    /// Mark the record as having passed the throttle cache.
    pub fn throttled(mut self, call_site: Option<CallSite>) -> Self {
        self.throttled = true;
        self.call_site = call_site;
        self
    }

    /// Mark the record as local-only.
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }
}

/// Formats as `[SEVERITY] message`.
impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_tags_severity() {
        let record = LogRecord::new(Severity::Hint, "check the gripper", Instant::now());
        assert_eq!(record.to_string(), "[HINT] check the gripper");
    }

    #[test]
    fn test_throttled_marks_record() {
        let site = CallSite::caller();
        let record = LogRecord::new(Severity::Warn, "m", Instant::now()).throttled(Some(site));
        assert!(record.throttled);
        assert_eq!(record.call_site, Some(site));
        assert!(!record.local);
    }

    #[test]
    fn test_local_marks_record() {
        let record = LogRecord::new(Severity::Info, "m", Instant::now()).local();
        assert!(record.local);
        assert!(!record.throttled);
    }
}
