//! Per-identity throttle state.

use crate::domain::interval::ThrottleInterval;
use std::time::Instant;

/// State kept for one identity: when it was last admitted and under which
/// interval.
///
/// Only the registry mutates an entry, and only on admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleEntry {
    /// Timestamp of the most recent admission
    pub last_emitted_at: Instant,
    /// Interval requested by the most recent admitted call
    pub interval: ThrottleInterval,
    /// Registry-wide insertion number, breaks timestamp ties on eviction
    pub sequence: u64,
}

impl ThrottleEntry {
    /// Create the entry for a first admission.
    pub fn new(now: Instant, interval: ThrottleInterval, sequence: u64) -> Self {
        Self {
            last_emitted_at: now,
            interval,
            sequence,
        }
    }

    /// Decide whether a call requesting `interval` at `now` is admitted.
    ///
    /// The interval of the incoming call is used, not the stored one, so a
    /// caller can tighten or loosen its own window at any time. A `now`
    /// earlier than the last emission counts as zero elapsed time.
    pub fn admits(&self, interval: ThrottleInterval, now: Instant) -> bool {
        interval.is_zero()
            || now.saturating_duration_since(self.last_emitted_at) >= interval.as_duration()
    }

    /// Record an admission.
    pub fn record(&mut self, interval: ThrottleInterval, now: Instant) {
        self.last_emitted_at = now;
        self.interval = interval;
    }

    /// Eviction order key: oldest emission first, then oldest insertion.
    pub fn age_key(&self) -> (Instant, u64) {
        (self.last_emitted_at, self.sequence)
    }
}
