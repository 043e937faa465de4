//! `tracing` layer recording the events the tracing sink produces.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Layer that keeps every event it sees, optionally only for one target.
///
/// Clones share the recorded events.
#[derive(Clone, Default)]
pub struct MockCaptureLayer {
    target: Option<&'static str>,
    captured: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// One recorded event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// The `severity` field, if the event has one
    pub severity: Option<String>,
    /// The `call_site` field, if the event has one
    pub call_site: Option<String>,
    /// The `local` field, if the event has one
    pub local: Option<bool>,
}

impl MockCaptureLayer {
    /// Capture events from every target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture only events logged under `target`.
    pub fn for_target(target: &'static str) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    fn events(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get all captured events.
    pub fn get_captured(&self) -> Vec<CapturedEvent> {
        self.events().clone()
    }

    /// Get the messages of all captured events, in order.
    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(|e| e.message.clone()).collect()
    }

    /// Get the count of captured events.
    pub fn count(&self) -> usize {
        self.events().len()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.events().clear();
    }
}

impl<S: Subscriber> Layer<S> for MockCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.target.is_some_and(|target| target != metadata.target()) {
            return;
        }

        let mut fields = SinkFields::default();
        event.record(&mut fields);
        self.events().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: fields.message,
            severity: fields.severity,
            call_site: fields.call_site,
            local: fields.local,
        });
    }
}

#[derive(Default)]
struct SinkFields {
    message: String,
    severity: Option<String>,
    call_site: Option<String>,
    local: Option<bool>,
}

impl Visit for SinkFields {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "local" {
            self.local = Some(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "severity" => self.severity = Some(value.to_string()),
            "call_site" => self.call_site = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::info;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_records_sink_fields() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!(severity = "HINT", "test message");
        });

        let events = capture.get_captured();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::INFO);
        assert_eq!(events[0].message, "test message");
        assert_eq!(events[0].severity.as_deref(), Some("HINT"));

        capture.clear();
        assert_eq!(capture.count(), 0);
    }

    #[test]
    fn test_target_filter() {
        let capture = MockCaptureLayer::for_target("wanted");
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!(target: "wanted", "kept");
            info!(target: "other", "skipped");
        });

        assert_eq!(capture.messages(), vec!["kept"]);
    }
}
