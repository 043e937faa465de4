//! Severity-keyed dispatch of log calls to the sink.
//!
//! Every log call enters here, as either a direct call that always reaches
//! the sink or a throttled call that first asks the [`ThrottleRegistry`]
//! for admission. All severities share one code path; the severity is just
//! a tag on the record.
//!
//! A log call never fails the caller. The only error a call can return is
//! a rejected throttle interval, and that is reported before anything
//! happens. Sink errors and sink panics are counted and the record is
//! dropped without retry.

use crate::application::{
    circuit_breaker::{CircuitBreaker, CircuitState},
    metrics::Metrics,
    ports::{Clock, LogSink, ParameterSource},
    registry::ThrottleRegistry,
};
use crate::domain::{
    identity::{CallSite, IdentityPolicy},
    interval::ThrottleInterval,
    limits::{CacheLimits, ConfigError, CLEAR_RATIO_PARAMETER, MAX_SIZE_PARAMETER},
    record::LogRecord,
    severity::Severity,
};
use std::panic;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// What happened to one log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// The sink accepted the record
    Emitted,
    /// The throttle cache suppressed the call; the sink was not called
    Suppressed,
    /// The record was admitted but not written: no sink was attached, or
    /// the sink returned an error or panicked
    Dropped,
}

impl Emission {
    /// Whether the record reached the sink.
    pub fn is_emitted(&self) -> bool {
        matches!(self, Emission::Emitted)
    }

    /// Whether the throttle cache suppressed the call.
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Emission::Suppressed)
    }
}

/// Routes log calls by severity, throttled or direct, to the attached sink.
///
/// The registry is shared by `Arc`; replacing the sink never touches it,
/// so cached throttle state survives re-attachment to a new runtime.
#[derive(Debug)]
pub struct SeverityRouter {
    registry: Arc<ThrottleRegistry>,
    clock: Arc<dyn Clock>,
    sink: RwLock<Option<Arc<dyn LogSink>>>,
    identity_policy: IdentityPolicy,
    circuit_breaker: Arc<CircuitBreaker>,
    metrics: Metrics,
}

impl SeverityRouter {
    /// Create a router over an existing registry.
    ///
    /// Metrics are shared with the registry. Use
    /// `SeverityRouter::builder()` for the common setup.
    pub fn new(
        registry: Arc<ThrottleRegistry>,
        clock: Arc<dyn Clock>,
        sink: Option<Arc<dyn LogSink>>,
        identity_policy: IdentityPolicy,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let metrics = registry.metrics().clone();
        Self {
            registry,
            clock,
            sink: RwLock::new(sink),
            identity_policy,
            circuit_breaker,
            metrics,
        }
    }

    /// Emit a record unconditionally. The throttle cache is not consulted.
    pub fn emit(&self, severity: Severity, message: &str) -> Emission {
        let now = self.clock.now();
        self.metrics.record_direct();
        self.deliver(LogRecord::new(severity, message, now))
    }

    /// Emit a record meant for the local console only.
    ///
    /// Like `emit`, the throttle cache is not consulted. The record reaches
    /// the sink with `local` set; sinks that feed remote operators should
    /// leave it out.
    pub fn emit_local(&self, severity: Severity, message: &str) -> Emission {
        let now = self.clock.now();
        self.metrics.record_direct();
        self.deliver(LogRecord::new(severity, message, now).local())
    }

    /// Emit a record if the throttle cache admits it.
    ///
    /// The caller's source location is captured as the call site.
    #[track_caller]
    pub fn emit_throttled(
        &self,
        severity: Severity,
        interval: ThrottleInterval,
        message: &str,
    ) -> Emission {
        self.emit_throttled_at(severity, interval, message, Some(CallSite::caller()))
    }

    /// Emit a record if the throttle cache admits it, with an explicit call
    /// site (or none, in which case the message keys the identity).
    ///
    /// The clock is sampled once; the same instant drives the admission
    /// decision, is recorded in the cache, and stamps the record.
    pub fn emit_throttled_at(
        &self,
        severity: Severity,
        interval: ThrottleInterval,
        message: &str,
        call_site: Option<CallSite>,
    ) -> Emission {
        let now = self.clock.now();
        let identity = self
            .identity_policy
            .identify(severity, message, call_site.as_ref());

        if !self.registry.admit(identity, interval, now) {
            return Emission::Suppressed;
        }
        self.deliver(LogRecord::new(severity, message, now).throttled(call_site))
    }

    #[track_caller]
    fn throttle_secs(
        &self,
        severity: Severity,
        secs: f64,
        message: &str,
    ) -> Result<Emission, ConfigError> {
        let interval = ThrottleInterval::from_secs_f64(secs)?;
        Ok(self.emit_throttled(severity, interval, message))
    }

    /// Emit an error.
    pub fn error(&self, message: &str) -> Emission {
        self.emit(Severity::Error, message)
    }

    /// Emit a warning.
    pub fn warn(&self, message: &str) -> Emission {
        self.emit(Severity::Warn, message)
    }

    /// Emit an info message.
    pub fn info(&self, message: &str) -> Emission {
        self.emit(Severity::Info, message)
    }

    /// Emit a hint.
    pub fn hint(&self, message: &str) -> Emission {
        self.emit(Severity::Hint, message)
    }

    /// Emit a local-only error.
    pub fn local_error(&self, message: &str) -> Emission {
        self.emit_local(Severity::Error, message)
    }

    /// Emit a local-only warning.
    pub fn local_warn(&self, message: &str) -> Emission {
        self.emit_local(Severity::Warn, message)
    }

    /// Emit a local-only info message.
    pub fn local_info(&self, message: &str) -> Emission {
        self.emit_local(Severity::Info, message)
    }

    /// Emit an error at most once per `secs` seconds per identity.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidInterval` if `secs` is negative or not
    /// finite. Nothing is emitted or recorded in that case.
    #[track_caller]
    pub fn error_throttle(&self, secs: f64, message: &str) -> Result<Emission, ConfigError> {
        self.throttle_secs(Severity::Error, secs, message)
    }

    /// Emit a warning at most once per `secs` seconds per identity.
    ///
    /// # Errors
    /// See [`SeverityRouter::error_throttle`].
    #[track_caller]
    pub fn warn_throttle(&self, secs: f64, message: &str) -> Result<Emission, ConfigError> {
        self.throttle_secs(Severity::Warn, secs, message)
    }

    /// Emit an info message at most once per `secs` seconds per identity.
    ///
    /// # Errors
    /// See [`SeverityRouter::error_throttle`].
    #[track_caller]
    pub fn info_throttle(&self, secs: f64, message: &str) -> Result<Emission, ConfigError> {
        self.throttle_secs(Severity::Info, secs, message)
    }

    /// Emit a hint at most once per `secs` seconds per identity.
    ///
    /// # Errors
    /// See [`SeverityRouter::error_throttle`].
    #[track_caller]
    pub fn hint_throttle(&self, secs: f64, message: &str) -> Result<Emission, ConfigError> {
        self.throttle_secs(Severity::Hint, secs, message)
    }

    fn current_sink(&self) -> Option<Arc<dyn LogSink>> {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn deliver(&self, record: LogRecord<'_>) -> Emission {
        let Some(sink) = self.current_sink() else {
            self.metrics.record_dropped();
            return Emission::Dropped;
        };

        // The breaker fails open: it only decides whether failures are
        // reported, the sink is called regardless.
        let healthy = self.circuit_breaker.is_healthy_at(record.timestamp);
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| sink.write(&record)));
        match result {
            Ok(Ok(())) => {
                if self.circuit_breaker.record_success() {
                    tracing::info!("log sink recovered");
                }
                Emission::Emitted
            }
            Ok(Err(err)) => {
                self.sink_failed(&err.to_string(), record.timestamp, healthy);
                Emission::Dropped
            }
            Err(_) => {
                self.sink_failed("sink panicked", record.timestamp, healthy);
                Emission::Dropped
            }
        }
    }

    fn sink_failed(&self, error: &str, now: Instant, healthy: bool) {
        self.metrics.record_sink_failure();
        self.metrics.record_dropped();
        if self.circuit_breaker.record_failure(now) {
            tracing::warn!(
                error,
                failures = self.circuit_breaker.consecutive_failures(),
                "log sink keeps failing, further failures are not reported until it recovers"
            );
        } else if healthy {
            tracing::debug!(error, "log sink write failed, record dropped");
        }
    }

    /// Attach a sink, returning the one it replaces.
    ///
    /// The throttle cache is left as it is and the circuit breaker starts
    /// closed for the new sink.
    pub fn attach_sink(&self, sink: Arc<dyn LogSink>) -> Option<Arc<dyn LogSink>> {
        let previous = self
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(sink);
        self.circuit_breaker.reset();
        previous
    }

    /// Detach the sink. Admitted records are dropped until one is attached.
    pub fn detach_sink(&self) -> Option<Arc<dyn LogSink>> {
        self.sink
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Check whether a sink is attached.
    pub fn has_sink(&self) -> bool {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Reconfigure the cache from host parameters.
    ///
    /// Reads `max_throttle_logging_size` and `throttle_logging_clear_ratio`.
    /// When neither is supplied nothing changes and `Ok(false)` is returned.
    /// When either is supplied it is merged with the current limits.
    ///
    /// # Errors
    /// Returns `ConfigError` for an invalid value; the cache is unchanged.
    pub fn apply_parameters(&self, source: &dyn ParameterSource) -> Result<bool, ConfigError> {
        let max_size = source
            .integer(MAX_SIZE_PARAMETER)
            .transpose()?
            .map(CacheLimits::max_size_from_i64)
            .transpose()?;
        let clear_ratio = source.float(CLEAR_RATIO_PARAMETER);

        if max_size.is_none() && clear_ratio.is_none() {
            return Ok(false);
        }
        self.registry.reconfigure(max_size, clear_ratio)?;
        Ok(true)
    }

    /// Replace the cache limits, trimming the cache if it is now too large.
    pub fn configure(&self, limits: CacheLimits) {
        self.registry.configure(limits);
    }

    /// Get the shared registry.
    pub fn registry(&self) -> &Arc<ThrottleRegistry> {
        &self.registry
    }

    /// Get the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Get the sink circuit breaker.
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    /// Get the circuit state of the sink.
    pub fn sink_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Get the identity policy.
    pub fn identity_policy(&self) -> IdentityPolicy {
        self.identity_policy
    }

    /// Get the number of cached identities.
    pub fn cache_size(&self) -> usize {
        self.registry.len()
    }

    /// Get the maximum number of cached identities.
    pub fn cache_capacity(&self) -> usize {
        self.registry.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::{FailingSink, MockClock, RecordingSink};
    use std::time::Duration;

    struct Fixture {
        router: SeverityRouter,
        clock: Arc<MockClock>,
        sink: RecordingSink,
    }

    fn fixture(policy: IdentityPolicy) -> Fixture {
        let clock = Arc::new(MockClock::new(Instant::now()));
        let sink = RecordingSink::new();
        let router = SeverityRouter::new(
            Arc::new(ThrottleRegistry::default()),
            clock.clone(),
            Some(Arc::new(sink.clone()) as Arc<dyn LogSink>),
            policy,
            Arc::new(CircuitBreaker::new()),
        );
        Fixture {
            router,
            clock,
            sink,
        }
    }

    #[test]
    fn test_emit_bypasses_registry() {
        let f = fixture(IdentityPolicy::default());
        for _ in 0..10 {
            assert_eq!(f.router.error("motor stalled"), Emission::Emitted);
        }

        assert_eq!(f.sink.count(), 10);
        assert_eq!(f.router.cache_size(), 0);
        assert_eq!(f.router.metrics().direct_emissions(), 10);
    }

    #[test]
    fn test_local_calls_are_direct_and_marked() {
        let f = fixture(IdentityPolicy::default());
        for _ in 0..3 {
            assert_eq!(f.router.local_info("console only"), Emission::Emitted);
        }
        f.router.local_warn("w");
        f.router.local_error("e");
        f.router.info("operator");

        let records = f.sink.records();
        assert_eq!(records.len(), 6);
        assert!(records[..5].iter().all(|r| r.local && !r.throttled));
        assert!(!records[5].local);
        assert_eq!(records[4].severity, Severity::Error);
        assert_eq!(f.router.cache_size(), 0);
    }

    #[test]
    fn test_throttled_call_suppressed_within_window() {
        let f = fixture(IdentityPolicy::default());

        assert!(f.router.warn_throttle(1.0, "low battery").unwrap().is_emitted());
        f.clock.advance(Duration::from_millis(400));
        assert!(f
            .router
            .warn_throttle(1.0, "low battery")
            .unwrap()
            .is_suppressed());
        f.clock.advance(Duration::from_millis(600));
        assert!(f.router.warn_throttle(1.0, "low battery").unwrap().is_emitted());

        assert_eq!(f.sink.count(), 2);
    }

    #[test]
    fn test_record_carries_sampled_timestamp() {
        let f = fixture(IdentityPolicy::default());
        let t = f.clock.now();

        f.router.info_throttle(0.0, "tick").unwrap();

        let records = f.sink.records();
        assert_eq!(records[0].timestamp, t);
        assert!(records[0].throttled);
        assert_eq!(
            f.router
                .registry()
                .last_emitted_at(crate::domain::identity::LogIdentity::simple("tick")),
            Some(t)
        );
    }

    #[test]
    fn test_negative_interval_rejected_without_effect() {
        let f = fixture(IdentityPolicy::default());

        assert_eq!(
            f.router.error_throttle(-1.0, "bad"),
            Err(ConfigError::InvalidInterval(-1.0))
        );
        assert_eq!(f.sink.count(), 0);
        assert_eq!(f.router.cache_size(), 0);
    }

    #[test]
    fn test_severities_share_identity_by_default() {
        let f = fixture(IdentityPolicy::default());

        f.router.error_throttle(5.0, "same").unwrap();
        let warn = f.router.warn_throttle(5.0, "same").unwrap();

        assert_eq!(warn, Emission::Suppressed);
        assert_eq!(f.router.cache_size(), 1);
    }

    #[test]
    fn test_severities_split_when_configured() {
        let f = fixture(IdentityPolicy::by_message().with_severity(true));

        f.router.error_throttle(5.0, "same").unwrap();
        let warn = f.router.warn_throttle(5.0, "same").unwrap();

        assert_eq!(warn, Emission::Emitted);
        assert_eq!(f.router.cache_size(), 2);
    }

    #[test]
    fn test_call_site_identity_dedups_changing_text() {
        let f = fixture(IdentityPolicy::by_call_site());

        for i in 0..5 {
            f.router
                .info_throttle(10.0, &format!("waypoint {} reached", i))
                .unwrap();
        }

        assert_eq!(f.sink.count(), 1);
        assert_eq!(f.router.cache_size(), 1);
        let site = f.sink.records()[0].call_site.unwrap();
        assert!(site.file.ends_with("router.rs"));
    }

    #[test]
    fn test_hint_is_tagged() {
        let f = fixture(IdentityPolicy::default());
        f.router.hint("try re-homing the arm");
        assert_eq!(f.sink.records()[0].severity, Severity::Hint);
    }

    #[test]
    fn test_detached_sink_drops_but_still_records() {
        let f = fixture(IdentityPolicy::default());
        assert!(f.router.detach_sink().is_some());
        assert!(!f.router.has_sink());

        assert_eq!(
            f.router.error_throttle(1.0, "lost").unwrap(),
            Emission::Dropped
        );
        assert_eq!(f.router.cache_size(), 1);
        assert_eq!(
            f.router.error_throttle(1.0, "lost").unwrap(),
            Emission::Suppressed
        );
        assert_eq!(f.router.metrics().records_dropped(), 1);
    }

    #[test]
    fn test_attach_keeps_cache() {
        let f = fixture(IdentityPolicy::default());
        f.router.error_throttle(60.0, "once").unwrap();

        let replacement = RecordingSink::new();
        let previous = f.router.attach_sink(Arc::new(replacement.clone()));
        assert!(previous.is_some());

        assert!(f.router.error_throttle(60.0, "once").unwrap().is_suppressed());
        assert_eq!(f.router.cache_size(), 1);
        assert_eq!(replacement.count(), 0);
    }

    #[test]
    fn test_sink_failure_does_not_propagate() {
        let f = fixture(IdentityPolicy::default());
        f.router.attach_sink(Arc::new(FailingSink::new()));

        assert_eq!(f.router.error("x"), Emission::Dropped);
        assert_eq!(f.router.metrics().sink_failures(), 1);
    }

    #[test]
    fn test_sink_panic_is_contained() {
        let f = fixture(IdentityPolicy::default());
        f.router.attach_sink(Arc::new(FailingSink::panicking()));

        assert_eq!(f.router.warn_throttle(0.0, "boom").unwrap(), Emission::Dropped);
        assert_eq!(f.router.metrics().sink_failures(), 1);
        assert_eq!(f.router.cache_size(), 1);
    }
}
