//! Health tracking for the log sink.
//!
//! The breaker fails open: every record is still handed to the sink, and
//! the circuit state only decides what the router reports about failures.
//! After `failure_threshold` consecutive failures the circuit opens and
//! further failures are counted but not logged. Once `recovery_timeout`
//! has passed the circuit is half-open; the next failure reopens it with a
//! fresh warning, and any successful write closes it.
//!
//! Time is passed in by the caller so the breaker follows the router clock.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Sink is healthy
    Closed = 0,
    /// Sink failed repeatedly, failures are not reported
    Open = 1,
    /// Recovery timeout passed, the next write decides
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,
    /// Duration to wait before attempting recovery
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// Circuit breaker for protecting the sink and the calling loop.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    last_failure: Mutex<Option<Instant>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            consecutive_failures: AtomicU64::new(0),
            last_failure: Mutex::new(None),
            config,
        }
    }

    /// Get the current circuit state.
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Get the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check whether sink failures at `now` should be reported.
    ///
    /// Returns `false` while the circuit is open and the recovery timeout
    /// has not yet elapsed. Never stops a write.
    pub fn is_healthy_at(&self, now: Instant) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = self
                    .last_failure()
                    .map(|at| now.saturating_duration_since(at) >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if !recovered {
                    return false;
                }
                // Only one caller performs the transition.
                let result = self.state.compare_exchange(
                    CircuitState::Open as u8,
                    CircuitState::HalfOpen as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                result.is_ok() || self.state() == CircuitState::HalfOpen
            }
        }
    }

    /// Record a successful sink write. A success closes the circuit from
    /// any state.
    ///
    /// Returns `true` if the circuit was not closed before.
    pub fn record_success(&self) -> bool {
        self.consecutive_failures.store(0, Ordering::Release);
        let previous = self
            .state
            .swap(CircuitState::Closed as u8, Ordering::AcqRel);
        CircuitState::from(previous) != CircuitState::Closed
    }

    /// Record a failed sink write at `now`.
    ///
    /// Returns `true` if this failure opened the circuit.
    pub fn record_failure(&self, now: Instant) -> bool {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);

        match self.state() {
            CircuitState::HalfOpen => {
                self.state
                    .store(CircuitState::Open as u8, Ordering::Release);
                true
            }
            CircuitState::Closed if failures >= u64::from(self.config.failure_threshold) => {
                self.state
                    .compare_exchange(
                        CircuitState::Closed as u8,
                        CircuitState::Open as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
            }
            _ => false,
        }
    }

    fn last_failure(&self) -> Option<Instant> {
        *self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the number of consecutive failures.
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: timeout,
        })
    }

    #[test]
    fn test_initial_state() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        assert!(cb.is_healthy_at(Instant::now()));
    }

    #[test]
    fn test_failure_threshold() {
        let cb = breaker(3, Duration::from_secs(1));
        let now = Instant::now();

        assert!(!cb.record_failure(now));
        assert!(!cb.record_failure(now));
        assert_eq!(cb.state(), CircuitState::Closed);

        assert!(cb.record_failure(now));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.consecutive_failures(), 3);
    }

    #[test]
    fn test_open_circuit_quiet_until_timeout() {
        let cb = breaker(2, Duration::from_secs(10));
        let t0 = Instant::now();
        cb.record_failure(t0);
        cb.record_failure(t0);

        assert!(!cb.is_healthy_at(t0 + Duration::from_secs(9)));
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.is_healthy_at(t0 + Duration::from_secs(10)));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_closes_circuit() {
        let cb = breaker(2, Duration::from_millis(100));
        let t0 = Instant::now();
        cb.record_failure(t0);
        cb.record_failure(t0);

        assert!(cb.is_healthy_at(t0 + Duration::from_millis(150)));
        assert!(cb.record_success());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn test_half_open_failure_reopens_circuit() {
        let cb = breaker(2, Duration::from_millis(100));
        let t0 = Instant::now();
        cb.record_failure(t0);
        cb.record_failure(t0);

        let t1 = t0 + Duration::from_millis(150);
        assert!(cb.is_healthy_at(t1));
        assert!(cb.record_failure(t1));
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_healthy_at(t1 + Duration::from_millis(50)));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(1));
        let now = Instant::now();
        cb.record_failure(now);
        cb.record_failure(now);
        cb.record_success();
        assert_eq!(cb.consecutive_failures(), 0);

        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_success_closes_open_circuit() {
        let cb = breaker(1, Duration::from_secs(60));
        let t0 = Instant::now();
        cb.record_failure(t0);
        assert_eq!(cb.state(), CircuitState::Open);

        // The sink is still called while open, so a success can arrive
        // before the recovery timeout
        assert!(cb.record_success());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.record_success());
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.record_failure(Instant::now());
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn test_concurrent_failures_open_once() {
        let cb = Arc::new(breaker(10, Duration::from_secs(60)));
        let now = Instant::now();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cb = Arc::clone(&cb);
                thread::spawn(move || {
                    let mut opened = 0;
                    for _ in 0..10 {
                        if cb.record_failure(now) {
                            opened += 1;
                        }
                    }
                    opened
                })
            })
            .collect();

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.consecutive_failures(), 100);
    }
}
