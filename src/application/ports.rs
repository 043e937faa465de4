//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::limits::ConfigError;
use crate::domain::record::LogRecord;
use std::fmt::{self, Debug};
use std::time::Instant;

/// Port for obtaining monotonic time.
///
/// The registry never reads a clock itself; the router samples this port
/// once per call and passes the instant down.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Error reported by a sink that could not take a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink is detached or its transport is gone
    Unavailable,
    /// The sink accepted the call but failed to write
    Write(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Unavailable => write!(f, "log sink unavailable"),
            SinkError::Write(reason) => write!(f, "log sink write failed: {}", reason),
        }
    }
}

impl std::error::Error for SinkError {}

/// Port for the output that actually renders log records.
///
/// Implementations must not block for long: they are called on the
/// caller's thread, right after the throttle decision. Backpressure and
/// buffering are the sink's own business; a failed write is dropped, never
/// retried.
pub trait LogSink: Send + Sync + Debug {
    /// Write one record.
    fn write(&self, record: &LogRecord<'_>) -> Result<(), SinkError>;
}

/// Port for reading configuration parameters from the host runtime.
///
/// Returning `None` means the parameter was not supplied.
pub trait ParameterSource {
    /// Read an integer parameter.
    ///
    /// A parameter that is present but not an integer is an error, never
    /// `None`.
    fn integer(&self, name: &str) -> Option<Result<i64, ConfigError>>;

    /// Read a floating point parameter.
    fn float(&self, name: &str) -> Option<f64>;
}
