//! Bounded registry of last-emitted timestamps per log identity.
//!
//! The registry decides, for every throttled call, whether to admit or
//! suppress it. It holds at most `max_size` identities; inserting a new
//! identity into a full table first evicts a batch of the oldest entries.
//!
//! # Eviction order
//!
//! Entries are evicted oldest `last_emitted_at` first. Entries with equal
//! timestamps go in insertion order. An identity that keeps getting
//! admitted therefore stays, and one that fell silent ages out.
//!
//! # Concurrency
//!
//! One mutex covers the whole table. `admit`, `configure`, and eviction
//! each run as a single critical section, so no caller ever sees a
//! half-evicted table or one larger than `max_size`. Nothing inside the
//! critical section blocks or performs I/O; diagnostics are logged after
//! the lock is released.

use crate::application::metrics::Metrics;
use crate::domain::{
    entry::ThrottleEntry,
    identity::LogIdentity,
    interval::ThrottleInterval,
    limits::{CacheLimits, ConfigError},
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

type EntryMap = HashMap<LogIdentity, ThrottleEntry, ahash::RandomState>;

#[derive(Debug)]
struct RegistryState {
    entries: EntryMap,
    limits: CacheLimits,
    next_sequence: u64,
}

/// What a single `admit` call did, reported outside the lock.
#[derive(Debug, Clone, Copy)]
struct AdmitOutcome {
    admitted: bool,
    evicted: usize,
    size_before_eviction: usize,
}

impl RegistryState {
    fn new(limits: CacheLimits) -> Self {
        Self {
            entries: EntryMap::default(),
            limits,
            next_sequence: 0,
        }
    }

    fn admit(
        &mut self,
        identity: LogIdentity,
        interval: ThrottleInterval,
        now: Instant,
    ) -> AdmitOutcome {
        if let Some(entry) = self.entries.get_mut(&identity) {
            let admitted = entry.admits(interval, now);
            if admitted {
                entry.record(interval, now);
            }
            return AdmitOutcome {
                admitted,
                evicted: 0,
                size_before_eviction: self.entries.len(),
            };
        }

        let size_before_eviction = self.entries.len();
        let mut evicted = 0;
        let max_size = self.limits.max_size();
        if size_before_eviction >= max_size {
            // The batch must at least make room, even if the table was
            // somehow left above max_size.
            let needed = size_before_eviction + 1 - max_size;
            evicted = self.evict_oldest(self.limits.eviction_batch().max(needed));
        }

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.entries
            .insert(identity, ThrottleEntry::new(now, interval, sequence));

        AdmitOutcome {
            admitted: true,
            evicted,
            size_before_eviction,
        }
    }

    /// Remove the `count` oldest entries and return how many were removed.
    fn evict_oldest(&mut self, count: usize) -> usize {
        let count = count.min(self.entries.len());
        if count == 0 {
            return 0;
        }

        let mut ages: Vec<((Instant, u64), LogIdentity)> = self
            .entries
            .iter()
            .map(|(identity, entry)| (entry.age_key(), *identity))
            .collect();
        if count < ages.len() {
            ages.select_nth_unstable(count - 1);
        }
        for (_, identity) in &ages[..count] {
            self.entries.remove(identity);
        }
        count
    }

    fn apply_limits(&mut self, limits: CacheLimits) -> usize {
        self.limits = limits;
        let excess = self.entries.len().saturating_sub(limits.max_size());
        self.evict_oldest(excess)
    }
}

/// Registry managing the throttle cache.
///
/// Create one per logging session and share it by `Arc`; there is no
/// global instance.
#[derive(Debug)]
pub struct ThrottleRegistry {
    state: Mutex<RegistryState>,
    metrics: Metrics,
}

impl ThrottleRegistry {
    /// Create an empty registry with the given limits.
    pub fn new(limits: CacheLimits) -> Self {
        Self::with_metrics(limits, Metrics::new())
    }

    /// Create an empty registry that reports into shared metrics.
    pub fn with_metrics(limits: CacheLimits, metrics: Metrics) -> Self {
        Self {
            state: Mutex::new(RegistryState::new(limits)),
            metrics,
        }
    }

    // A panic while holding the lock cannot leave the map half-updated:
    // every mutation is a single insert, remove, or field store.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a throttled call is admitted.
    ///
    /// `now` is supplied by the caller and is the timestamp recorded on
    /// admission. An unknown identity is always admitted; a known one is
    /// admitted when `interval` is zero or at least `interval` has passed
    /// since its last admission. A suppressed call leaves the entry as it
    /// was.
    ///
    /// Eviction only happens when a new identity meets a full table.
    pub fn admit(&self, identity: LogIdentity, interval: ThrottleInterval, now: Instant) -> bool {
        let outcome = self.lock().admit(identity, interval, now);

        if outcome.admitted {
            self.metrics.record_admitted();
        } else {
            self.metrics.record_suppressed();
        }
        if outcome.evicted > 0 {
            self.metrics.record_evictions(outcome.evicted);
            tracing::debug!(
                evicted = outcome.evicted,
                size_before = outcome.size_before_eviction,
                size_after = outcome.size_before_eviction - outcome.evicted + 1,
                "throttle cache full, evicted oldest identities"
            );
        }

        outcome.admitted
    }

    /// Replace the cache limits.
    ///
    /// If the table holds more than the new `max_size`, the oldest entries
    /// are evicted before this returns.
    pub fn configure(&self, limits: CacheLimits) {
        let trimmed = self.lock().apply_limits(limits);
        self.report_reconfigure(limits, trimmed);
    }

    /// Update one or both limits, keeping the current value of the other.
    ///
    /// Validation happens before anything changes; on error the registry is
    /// untouched. Returns the limits now in effect.
    ///
    /// # Errors
    /// Returns the `ConfigError` of the first invalid value.
    pub fn reconfigure(
        &self,
        max_size: Option<usize>,
        clear_ratio: Option<f64>,
    ) -> Result<CacheLimits, ConfigError> {
        let (limits, trimmed) = {
            let mut state = self.lock();
            let limits = CacheLimits::new(
                max_size.unwrap_or(state.limits.max_size()),
                clear_ratio.unwrap_or(state.limits.clear_ratio()),
            )?;
            (limits, state.apply_limits(limits))
        };
        self.report_reconfigure(limits, trimmed);
        Ok(limits)
    }

    fn report_reconfigure(&self, limits: CacheLimits, trimmed: usize) {
        if trimmed > 0 {
            self.metrics.record_evictions(trimmed);
        }
        tracing::debug!(
            max_size = limits.max_size(),
            clear_ratio = limits.clear_ratio(),
            trimmed,
            "throttle cache reconfigured"
        );
    }

    /// Get the limits in effect.
    pub fn limits(&self) -> CacheLimits {
        self.lock().limits
    }

    /// Get the maximum number of tracked identities.
    pub fn capacity(&self) -> usize {
        self.lock().limits.max_size()
    }

    /// Get the number of tracked identities.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Check whether an identity is tracked.
    pub fn contains(&self, identity: LogIdentity) -> bool {
        self.lock().entries.contains_key(&identity)
    }

    /// Get a copy of the entry for an identity.
    pub fn entry(&self, identity: LogIdentity) -> Option<ThrottleEntry> {
        self.lock().entries.get(&identity).copied()
    }

    /// Get the last admission time of an identity.
    pub fn last_emitted_at(&self, identity: LogIdentity) -> Option<Instant> {
        self.entry(identity).map(|entry| entry.last_emitted_at)
    }

    /// Drop every tracked identity. Limits are kept.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Get the metrics this registry reports into.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl Default for ThrottleRegistry {
    fn default() -> Self {
        Self::new(CacheLimits::default())
    }
}
