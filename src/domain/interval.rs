//! Throttle intervals.

use crate::domain::limits::ConfigError;
use std::fmt;
use std::time::Duration;

/// Minimum time between two admitted emissions of one identity.
///
/// Zero means "always admit, but still record the emission".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ThrottleInterval(Duration);

impl ThrottleInterval {
    /// Interval that never suppresses.
    pub const ZERO: ThrottleInterval = ThrottleInterval(Duration::ZERO);

    /// Create an interval from seconds as supplied by callers.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidInterval` for negative, NaN or infinite
    /// values, or values too large for a `Duration`.
    pub fn from_secs_f64(secs: f64) -> Result<Self, ConfigError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ConfigError::InvalidInterval(secs));
        }
        Duration::try_from_secs_f64(secs)
            .map(ThrottleInterval)
            .map_err(|_| ConfigError::InvalidInterval(secs))
    }

    /// The interval as a `Duration`.
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Whether this interval never suppresses.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for ThrottleInterval {
    fn from(duration: Duration) -> Self {
        ThrottleInterval(duration)
    }
}

impl fmt::Display for ThrottleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs_f64())
    }
}
