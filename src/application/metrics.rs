//! Observability metrics for the throttled logger.
//!
//! Counters describe throttle decisions, cache evictions, and what happened
//! to records after admission.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking throttling statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Throttled calls admitted by the registry
    events_admitted: AtomicU64,
    /// Throttled calls suppressed by the registry
    events_suppressed: AtomicU64,
    /// Identities removed by eviction or trimming
    identities_evicted: AtomicU64,
    /// Unthrottled calls forwarded to the sink
    direct_emissions: AtomicU64,
    /// Sink writes that returned an error or panicked
    sink_failures: AtomicU64,
    /// Records that never reached the sink
    records_dropped: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.events_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.inner.events_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.inner
            .identities_evicted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_direct(&self) {
        self.inner.direct_emissions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sink_failure(&self) {
        self.inner.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.inner.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of throttled calls admitted.
    pub fn events_admitted(&self) -> u64 {
        self.inner.events_admitted.load(Ordering::Relaxed)
    }

    /// Get the number of throttled calls suppressed.
    pub fn events_suppressed(&self) -> u64 {
        self.inner.events_suppressed.load(Ordering::Relaxed)
    }

    /// Get the number of identities evicted from the cache.
    pub fn identities_evicted(&self) -> u64 {
        self.inner.identities_evicted.load(Ordering::Relaxed)
    }

    /// Get the number of unthrottled emissions.
    pub fn direct_emissions(&self) -> u64 {
        self.inner.direct_emissions.load(Ordering::Relaxed)
    }

    /// Get the number of failed sink writes.
    pub fn sink_failures(&self) -> u64 {
        self.inner.sink_failures.load(Ordering::Relaxed)
    }

    /// Get the number of records dropped before or at the sink.
    pub fn records_dropped(&self) -> u64 {
        self.inner.records_dropped.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_admitted: self.events_admitted(),
            events_suppressed: self.events_suppressed(),
            identities_evicted: self.identities_evicted(),
            direct_emissions: self.direct_emissions(),
            sink_failures: self.sink_failures(),
            records_dropped: self.records_dropped(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.events_admitted.store(0, Ordering::Relaxed);
        self.inner.events_suppressed.store(0, Ordering::Relaxed);
        self.inner.identities_evicted.store(0, Ordering::Relaxed);
        self.inner.direct_emissions.store(0, Ordering::Relaxed);
        self.inner.sink_failures.store(0, Ordering::Relaxed);
        self.inner.records_dropped.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Throttled calls admitted
    pub events_admitted: u64,
    /// Throttled calls suppressed
    pub events_suppressed: u64,
    /// Identities evicted from the cache
    pub identities_evicted: u64,
    /// Unthrottled emissions
    pub direct_emissions: u64,
    /// Failed sink writes
    pub sink_failures: u64,
    /// Records that never reached the sink
    pub records_dropped: u64,
}

impl MetricsSnapshot {
    /// Calculate the suppression rate of throttled calls (0.0 to 1.0).
    ///
    /// Returns 0.0 if no throttled calls have been made.
    pub fn suppression_rate(&self) -> f64 {
        let total = self.throttled_calls();
        if total == 0 {
            0.0
        } else {
            self.events_suppressed as f64 / total as f64
        }
    }

    /// Get the total number of throttled calls (admitted + suppressed).
    pub fn throttled_calls(&self) -> u64 {
        self.events_admitted.saturating_add(self.events_suppressed)
    }
}
