//! # throttled-log
//!
//! Throttled logging for long-running control loops.
//!
//! A node that logs from a loop running hundreds of times a second floods
//! its output with the same few lines. This crate keeps a bounded cache of
//! when each distinct log line was last emitted, and lets a caller say
//! "emit this at most once every N seconds". Unthrottled calls go straight
//! through.
//!
//! ## Quick Start
//!
//! ```rust
//! use throttled_log::{Emission, SeverityRouter};
//!
//! let router = SeverityRouter::builder()
//!     .with_max_size(200)
//!     .with_clear_ratio(0.35)
//!     .build()
//!     .unwrap();
//!
//! // First call for an identity is always emitted
//! assert_eq!(router.warn_throttle(5.0, "joint limit reached").unwrap(), Emission::Emitted);
//! // Repeats inside the interval are suppressed
//! assert_eq!(router.warn_throttle(5.0, "joint limit reached").unwrap(), Emission::Suppressed);
//!
//! // Direct calls bypass the cache entirely
//! router.error("controller stopped");
//! ```
//!
//! Records go to a [`LogSink`]. The default sink forwards them to `tracing`
//! under the `throttled_log` target, so any subscriber renders them:
//!
//! ```rust,no_run
//! tracing_subscriber::fmt().init();
//! let router = throttled_log::SeverityRouter::default();
//! router.info("loop started");
//! ```
//!
//! ## Identities
//!
//! Throttled calls are grouped by a [`LogIdentity`]. By default the identity
//! is the message text, so the same text from two severities shares one
//! throttle slot. [`IdentityPolicy`] can key on the call site instead, or
//! fold the severity into the identity:
//!
//! ```rust
//! use throttled_log::{IdentityPolicy, SeverityRouter};
//!
//! let router = SeverityRouter::builder()
//!     .with_identity_policy(IdentityPolicy::by_call_site().with_severity(true))
//!     .build()
//!     .unwrap();
//! # let _ = router;
//! ```
//!
//! ## Bounded Cache
//!
//! The cache holds at most `max_size` identities. When a new identity
//! arrives at a full cache, `ceil(max_size * clear_ratio)` of the least
//! recently emitted entries are evicted first. An evicted identity behaves
//! like a new one: its next call is emitted.
//!
//! Limits can be changed at runtime from host parameters:
//!
//! ```rust
//! use throttled_log::{ParameterMap, SeverityRouter};
//!
//! let router = SeverityRouter::default();
//! let mut params = ParameterMap::new();
//! params.insert("max_throttle_logging_size", 50_i64);
//! params.insert("throttle_logging_clear_ratio", 0.5);
//!
//! assert!(router.apply_parameters(&params).unwrap());
//! assert_eq!(router.cache_capacity(), 50);
//! ```
//!
//! ## Sink Failures
//!
//! A sink that errors or panics never disturbs the caller. The record is
//! dropped and counted, and the next record is still handed to the sink.
//! After repeated failures a circuit breaker stops reporting each failure
//! until its recovery timeout passes or a write succeeds. Throttle state is
//! updated either way.
//!
//! ## Architecture
//!
//! The crate follows a hexagonal layout:
//! - **Domain**: severities, identities, intervals, limits, records
//! - **Application**: the registry, the router, metrics and ports
//! - **Infrastructure**: clock, `tracing` sink, parameters, builder

// Domain layer - pure types
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    entry::ThrottleEntry,
    identity::{CallSite, IdentityKey, IdentityPolicy, LogIdentity},
    interval::ThrottleInterval,
    limits::{
        CacheLimits, ConfigError, CLEAR_RATIO_PARAMETER, DEFAULT_CLEAR_RATIO, DEFAULT_MAX_SIZE,
        MAX_SIZE_PARAMETER,
    },
    record::LogRecord,
    severity::{ParseSeverityError, Severity},
};

pub use application::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState},
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, LogSink, ParameterSource, SinkError},
    registry::ThrottleRegistry,
    router::{Emission, SeverityRouter},
};

pub use infrastructure::{
    builder::{BuildError, SeverityRouterBuilder},
    clock::SystemClock,
    parameters::{ParameterFn, ParameterMap, ParameterValue},
    sink::{TracingSink, SINK_TARGET},
};
