//! Capacity limits of the throttle cache and their validation.

use serde::Deserialize;
use std::fmt;

/// Default maximum number of tracked identities.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default fraction of capacity evicted when the cache is full.
pub const DEFAULT_CLEAR_RATIO: f64 = 0.25;

/// Host parameter carrying the maximum cache size.
pub const MAX_SIZE_PARAMETER: &str = "max_throttle_logging_size";

/// Host parameter carrying the clear ratio.
pub const CLEAR_RATIO_PARAMETER: &str = "throttle_logging_clear_ratio";

/// Tolerance applied before rounding the eviction batch up, so that
/// products like `200 * 0.35 = 70.00000000000001` round to 70.
const RATIO_EPSILON: f64 = 1e-9;

/// Error returned when a configuration value is rejected.
///
/// The call that carried the bad value has no effect on the cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Maximum size must be at least one
    ZeroMaxSize,
    /// Maximum size supplied by the host is negative or out of range
    InvalidMaxSize(i64),
    /// Clear ratio must lie in (0, 1]
    InvalidClearRatio(f64),
    /// Throttle interval must be finite and non-negative
    InvalidInterval(f64),
    /// An integer parameter was given a fractional or out-of-range number
    NotAnInteger(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroMaxSize => write!(f, "max_size must be greater than 0"),
            ConfigError::InvalidMaxSize(v) => {
                write!(f, "max_size must be a positive integer, got {}", v)
            }
            ConfigError::InvalidClearRatio(v) => {
                write!(f, "clear_ratio must be in (0, 1], got {}", v)
            }
            ConfigError::InvalidInterval(v) => {
                write!(
                    f,
                    "throttle interval must be a finite number of seconds >= 0, got {}",
                    v
                )
            }
            ConfigError::NotAnInteger(v) => write!(f, "expected an integer, got {}", v),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Size bound and eviction ratio of the throttle cache.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawCacheLimits")]
pub struct CacheLimits {
    max_size: usize,
    clear_ratio: f64,
}

impl CacheLimits {
    /// Create validated limits.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroMaxSize` if `max_size` is zero and
    /// `ConfigError::InvalidClearRatio` unless `0 < clear_ratio <= 1`.
    pub fn new(max_size: usize, clear_ratio: f64) -> Result<Self, ConfigError> {
        if max_size == 0 {
            return Err(ConfigError::ZeroMaxSize);
        }
        if !(clear_ratio > 0.0 && clear_ratio <= 1.0) {
            return Err(ConfigError::InvalidClearRatio(clear_ratio));
        }
        Ok(Self {
            max_size,
            clear_ratio,
        })
    }

    /// Validate a size supplied as a signed host parameter.
    pub fn max_size_from_i64(value: i64) -> Result<usize, ConfigError> {
        match usize::try_from(value) {
            Ok(0) => Err(ConfigError::ZeroMaxSize),
            Ok(size) => Ok(size),
            Err(_) => Err(ConfigError::InvalidMaxSize(value)),
        }
    }

    /// Maximum number of tracked identities.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Fraction of capacity evicted per eviction cycle.
    pub fn clear_ratio(&self) -> f64 {
        self.clear_ratio
    }

    /// Number of entries one eviction cycle removes from a full cache.
    ///
    /// `ceil(max_size * clear_ratio)`, at least 1, and at most
    /// `max_size - 1` so a cycle never empties the table. A single-slot
    /// cache is the exception: its only entry has to go to make room.
    pub fn eviction_batch(&self) -> usize {
        let raw = (self.max_size as f64 * self.clear_ratio - RATIO_EPSILON).ceil();
        let batch = if raw < 1.0 { 1 } else { raw as usize };
        batch.min(self.max_size.saturating_sub(1)).max(1)
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            clear_ratio: DEFAULT_CLEAR_RATIO,
        }
    }
}

#[derive(Deserialize)]
struct RawCacheLimits {
    #[serde(default = "default_max_size", alias = "max_throttle_logging_size")]
    max_size: i64,
    #[serde(default = "default_clear_ratio", alias = "throttle_logging_clear_ratio")]
    clear_ratio: f64,
}

fn default_max_size() -> i64 {
    DEFAULT_MAX_SIZE as i64
}

fn default_clear_ratio() -> f64 {
    DEFAULT_CLEAR_RATIO
}

impl TryFrom<RawCacheLimits> for CacheLimits {
    type Error = ConfigError;

    fn try_from(raw: RawCacheLimits) -> Result<Self, Self::Error> {
        let max_size = CacheLimits::max_size_from_i64(raw.max_size)?;
        CacheLimits::new(max_size, raw.clear_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = CacheLimits::default();
        assert_eq!(limits.max_size(), 100);
        assert!((limits.clear_ratio() - 0.25).abs() < f64::EPSILON);
        assert_eq!(limits.eviction_batch(), 25);
    }

    #[test]
    fn test_rejects_zero_size() {
        assert_eq!(CacheLimits::new(0, 0.5), Err(ConfigError::ZeroMaxSize));
    }

    #[test]
    fn test_rejects_bad_ratio() {
        assert!(matches!(
            CacheLimits::new(10, 0.0),
            Err(ConfigError::InvalidClearRatio(_))
        ));
        assert!(matches!(
            CacheLimits::new(10, 1.5),
            Err(ConfigError::InvalidClearRatio(_))
        ));
        assert!(matches!(
            CacheLimits::new(10, f64::NAN),
            Err(ConfigError::InvalidClearRatio(_))
        ));
        assert!(CacheLimits::new(10, 1.0).is_ok());
    }

    #[test]
    fn test_batch_rounds_up_without_float_noise() {
        assert_eq!(CacheLimits::new(200, 0.35).unwrap().eviction_batch(), 70);
        assert_eq!(CacheLimits::new(120, 0.22).unwrap().eviction_batch(), 27);
        assert_eq!(CacheLimits::new(100, 0.7).unwrap().eviction_batch(), 70);
        assert_eq!(CacheLimits::new(10, 0.01).unwrap().eviction_batch(), 1);
    }

    #[test]
    fn test_batch_never_empties_table() {
        assert_eq!(CacheLimits::new(10, 1.0).unwrap().eviction_batch(), 9);
        assert_eq!(CacheLimits::new(2, 1.0).unwrap().eviction_batch(), 1);
        assert_eq!(CacheLimits::new(1, 1.0).unwrap().eviction_batch(), 1);
    }

    #[test]
    fn test_max_size_from_host_integer() {
        assert_eq!(CacheLimits::max_size_from_i64(120), Ok(120));
        assert_eq!(
            CacheLimits::max_size_from_i64(0),
            Err(ConfigError::ZeroMaxSize)
        );
        assert_eq!(
            CacheLimits::max_size_from_i64(-3),
            Err(ConfigError::InvalidMaxSize(-3))
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConfigError::ZeroMaxSize.to_string(),
            "max_size must be greater than 0"
        );
        assert!(ConfigError::InvalidInterval(-1.0).to_string().contains("-1"));
    }
}
