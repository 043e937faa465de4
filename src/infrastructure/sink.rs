//! `tracing` adapter for the sink port.
//!
//! Admitted records become `tracing` events, so whatever subscriber the
//! process installs (console, journald, telemetry) renders them.

use crate::application::ports::{LogSink, SinkError};
use crate::domain::{record::LogRecord, severity::Severity};

/// Target used for every forwarded event.
pub const SINK_TARGET: &str = "throttled_log";

/// Sink that forwards records as `tracing` events.
///
/// Each event carries `severity`, `throttled`, `local` and, when known,
/// `call_site` fields. Hints are emitted at `INFO` with `severity = "HINT"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Create a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord<'_>) -> Result<(), SinkError> {
        let call_site = record.call_site.map(|site| site.to_string());
        let call_site = call_site.as_deref();
        let severity = record.severity.as_str();
        let throttled = record.throttled;
        let local = record.local;
        let message = record.message;

        match record.severity {
            Severity::Error => {
                tracing::error!(
                    target: SINK_TARGET,
                    severity,
                    throttled,
                    local,
                    call_site,
                    "{}",
                    message
                )
            }
            Severity::Warn => {
                tracing::warn!(
                    target: SINK_TARGET,
                    severity,
                    throttled,
                    local,
                    call_site,
                    "{}",
                    message
                )
            }
            Severity::Info | Severity::Hint => {
                tracing::info!(
                    target: SINK_TARGET,
                    severity,
                    throttled,
                    local,
                    call_site,
                    "{}",
                    message
                )
            }
        }
        Ok(())
    }
}
