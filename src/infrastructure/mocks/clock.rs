//! Manually driven clock.

use crate::application::ports::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clock that only moves when a test moves it.
///
/// Time is kept as an offset from the origin instant, so throttle windows
/// and sink recovery timeouts can be crossed without sleeping.
///
/// ```
/// use throttled_log::infrastructure::mocks::MockClock;
/// use throttled_log::application::ports::Clock;
/// use std::time::{Duration, Instant};
///
/// let origin = Instant::now();
/// let clock = MockClock::new(origin);
/// assert_eq!(clock.now(), origin);
///
/// clock.advance_secs(0.25);
/// assert_eq!(clock.elapsed(), Duration::from_millis(250));
/// ```
///
/// Clones share the offset: a test keeps a handle while the router owns
/// another, and advancing either moves both.
#[derive(Debug, Clone)]
pub struct MockClock {
    origin: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a clock reading `origin` until advanced.
    pub fn new(origin: Instant) -> Self {
        Self {
            origin,
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .offset_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(nanos))
            });
    }

    /// Move the clock forward by fractional seconds.
    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    /// Jump to `instant`. Instants before the origin read as the origin.
    pub fn set(&self, instant: Instant) {
        let nanos = u64::try_from(instant.saturating_duration_since(self.origin).as_nanos())
            .unwrap_or(u64::MAX);
        self.offset_nanos.store(nanos, Ordering::SeqCst);
    }

    /// Time advanced since the origin.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_only_when_told() {
        let origin = Instant::now();
        let clock = MockClock::new(origin);
        assert_eq!(clock.now(), clock.now());

        clock.advance(Duration::from_secs(3));
        clock.advance_secs(0.5);
        assert_eq!(clock.now(), origin + Duration::from_millis(3_500));
    }

    #[test]
    fn test_set() {
        let origin = Instant::now();
        let clock = MockClock::new(origin);

        clock.set(origin + Duration::from_secs(100));
        assert_eq!(clock.elapsed(), Duration::from_secs(100));

        // Backwards jumps are allowed down to the origin
        clock.set(origin + Duration::from_secs(1));
        assert_eq!(clock.now(), origin + Duration::from_secs(1));
    }

    #[test]
    fn test_clones_share_offset() {
        let origin = Instant::now();
        let clock = MockClock::new(origin);
        let handle = clock.clone();

        handle.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), origin + Duration::from_secs(1));
    }
}
