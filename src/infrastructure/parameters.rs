//! Host parameter adapters.
//!
//! The host runtime hands over configuration as named parameters. These
//! adapters implement the `ParameterSource` port for the shapes hosts
//! usually have at hand: a map deserialized from a parameter file, or a
//! lookup closure over the runtime's own parameter server.

use crate::application::ports::ParameterSource;
use crate::domain::limits::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A single parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Integer parameter
    Integer(i64),
    /// Floating point parameter
    Float(f64),
}

impl ParameterValue {
    /// Read as an integer. Floats with no fractional part are accepted.
    ///
    /// # Errors
    /// Returns `ConfigError::NotAnInteger` for fractional, non-finite or
    /// out-of-range floats.
    pub fn as_integer(&self) -> Result<i64, ConfigError> {
        match *self {
            ParameterValue::Integer(value) => Ok(value),
            ParameterValue::Float(value)
                if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 =>
            {
                Ok(value as i64)
            }
            ParameterValue::Float(value) => Err(ConfigError::NotAnInteger(value)),
        }
    }

    /// Read as a float. Integers are widened.
    pub fn as_float(&self) -> f64 {
        match *self {
            ParameterValue::Integer(value) => value as f64,
            ParameterValue::Float(value) => value,
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

/// Named parameters, deserializable from any serde format.
///
/// ```
/// use throttled_log::infrastructure::parameters::{ParameterMap, ParameterValue};
/// use throttled_log::application::ports::ParameterSource;
///
/// let mut params = ParameterMap::new();
/// params.insert("max_throttle_logging_size", ParameterValue::Integer(200));
/// assert_eq!(params.integer("max_throttle_logging_size"), Some(Ok(200)));
/// assert_eq!(params.float("throttle_logging_clear_ratio"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ParameterMap {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a parameter.
    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.values.get(name).copied()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ParameterSource for ParameterMap {
    fn integer(&self, name: &str) -> Option<Result<i64, ConfigError>> {
        self.get(name).map(|value| value.as_integer())
    }

    fn float(&self, name: &str) -> Option<f64> {
        self.get(name).map(|value| value.as_float())
    }
}

/// Parameter source backed by a lookup function.
///
/// Wraps whatever accessor the host runtime offers.
pub struct ParameterFn<F>(pub F)
where
    F: Fn(&str) -> Option<ParameterValue>;

impl<F> ParameterSource for ParameterFn<F>
where
    F: Fn(&str) -> Option<ParameterValue>,
{
    fn integer(&self, name: &str) -> Option<Result<i64, ConfigError>> {
        (self.0)(name).map(|value| value.as_integer())
    }

    fn float(&self, name: &str) -> Option<f64> {
        (self.0)(name).map(|value| value.as_float())
    }
}
