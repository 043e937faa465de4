//! Mock sinks for testing.

use crate::application::ports::{LogSink, SinkError};
use crate::domain::{identity::CallSite, record::LogRecord, severity::Severity};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Owned copy of a record written to a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CapturedRecord {
    pub severity: Severity,
    pub message: String,
    pub timestamp: Instant,
    pub throttled: bool,
    pub call_site: Option<CallSite>,
    pub local: bool,
}

impl From<&LogRecord<'_>> for CapturedRecord {
    fn from(record: &LogRecord<'_>) -> Self {
        Self {
            severity: record.severity,
            message: record.message.to_string(),
            timestamp: record.timestamp,
            throttled: record.throttled,
            call_site: record.call_site,
            local: record.local,
        }
    }
}

/// Sink that keeps every record it is given.
///
/// Clones share the captured records.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured records.
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records
            .lock()
            .expect("RecordingSink mutex poisoned")
            .clone()
    }

    /// Get the number of captured records.
    pub fn count(&self) -> usize {
        self.records
            .lock()
            .expect("RecordingSink mutex poisoned")
            .len()
    }

    /// Get the number of captured records of one severity.
    pub fn count_of(&self, severity: Severity) -> usize {
        self.records
            .lock()
            .expect("RecordingSink mutex poisoned")
            .iter()
            .filter(|record| record.severity == severity)
            .count()
    }

    /// Get the captured messages in order.
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("RecordingSink mutex poisoned")
            .iter()
            .map(|record| record.message.clone())
            .collect()
    }

    /// Clear all captured records.
    pub fn clear(&self) {
        self.records
            .lock()
            .expect("RecordingSink mutex poisoned")
            .clear();
    }
}

impl LogSink for RecordingSink {
    fn write(&self, record: &LogRecord<'_>) -> Result<(), SinkError> {
        self.records
            .lock()
            .expect("RecordingSink mutex poisoned")
            .push(CapturedRecord::from(record));
        Ok(())
    }
}

/// Sink that fails while told to, and succeeds otherwise.
///
/// Failing writes either return `SinkError::Write` or panic, depending on
/// how the sink was created. Clones share state.
#[derive(Debug, Clone)]
pub struct FailingSink {
    failing: Arc<AtomicBool>,
    panics: bool,
    attempts: Arc<AtomicUsize>,
    successes: Arc<AtomicUsize>,
}

impl FailingSink {
    /// Create a sink whose writes return an error.
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Create a sink whose writes panic.
    pub fn panicking() -> Self {
        Self::build(true)
    }

    fn build(panics: bool) -> Self {
        Self {
            failing: Arc::new(AtomicBool::new(true)),
            panics,
            attempts: Arc::new(AtomicUsize::new(0)),
            successes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Switch failure on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get the number of write calls, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Get the number of successful writes.
    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }
}

impl Default for FailingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for FailingSink {
    fn write(&self, _record: &LogRecord<'_>) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.failing.load(Ordering::SeqCst) {
            self.successes.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        if self.panics {
            panic!("FailingSink configured to panic");
        }
        Err(SinkError::Write("transport closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_captures() {
        let sink = RecordingSink::new();
        let now = Instant::now();
        sink.write(&LogRecord::new(Severity::Warn, "a", now)).unwrap();
        sink.write(&LogRecord::new(Severity::Info, "b", now)).unwrap();

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_of(Severity::Warn), 1);
        assert_eq!(sink.messages(), vec!["a".to_string(), "b".to_string()]);

        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_failing_sink_toggles() {
        let sink = FailingSink::new();
        let record = LogRecord::new(Severity::Error, "x", Instant::now());

        assert!(sink.write(&record).is_err());
        sink.set_failing(false);
        assert!(sink.write(&record).is_ok());
        assert_eq!(sink.attempts(), 2);
        assert_eq!(sink.successes(), 1);
    }
}
