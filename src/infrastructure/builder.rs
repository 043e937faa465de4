//! Builder wiring a [`SeverityRouter`] to its collaborators.

use crate::application::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    metrics::Metrics,
    ports::{Clock, LogSink},
    registry::ThrottleRegistry,
    router::SeverityRouter,
};
use crate::domain::{
    identity::IdentityPolicy,
    limits::{CacheLimits, ConfigError, DEFAULT_CLEAR_RATIO, DEFAULT_MAX_SIZE},
};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::sink::TracingSink;
use std::sync::Arc;

/// Error returned when building a `SeverityRouter` fails.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Cache limits were rejected
    Config(ConfigError),
    /// A registry was supplied together with explicit limits
    ConflictingRegistry,
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Config(e) => write!(f, "configuration error: {}", e),
            BuildError::ConflictingRegistry => {
                write!(
                    f,
                    "cache limits cannot be set when an existing registry is supplied"
                )
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Config(e) => Some(e),
            BuildError::ConflictingRegistry => None,
        }
    }
}

impl From<ConfigError> for BuildError {
    fn from(e: ConfigError) -> Self {
        BuildError::Config(e)
    }
}

/// Builder for constructing a `SeverityRouter`.
///
/// Defaults:
/// - Cache: 100 identities, clear ratio 0.25
/// - Identity: message text, severity ignored
/// - Clock: `SystemClock`
/// - Sink: `TracingSink`
/// - Circuit breaker: 5 failures, 30 second recovery
#[derive(Debug)]
pub struct SeverityRouterBuilder {
    max_size: Option<usize>,
    clear_ratio: Option<f64>,
    registry: Option<Arc<ThrottleRegistry>>,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Option<Arc<dyn LogSink>>>,
    identity_policy: IdentityPolicy,
    circuit_breaker_config: CircuitBreakerConfig,
    metrics: Option<Metrics>,
}

impl SeverityRouterBuilder {
    fn new() -> Self {
        Self {
            max_size: None,
            clear_ratio: None,
            registry: None,
            clock: None,
            sink: None,
            identity_policy: IdentityPolicy::default(),
            circuit_breaker_config: CircuitBreakerConfig::default(),
            metrics: None,
        }
    }

    /// Set both cache limits.
    pub fn with_limits(mut self, limits: CacheLimits) -> Self {
        self.max_size = Some(limits.max_size());
        self.clear_ratio = Some(limits.clear_ratio());
        self
    }

    /// Set the maximum number of cached identities.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Set the fraction of capacity evicted when the cache is full.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_clear_ratio(mut self, clear_ratio: f64) -> Self {
        self.clear_ratio = Some(clear_ratio);
        self
    }

    /// Share an existing registry instead of creating one.
    ///
    /// Useful when a logging session outlives a runtime: the new router
    /// picks up the throttle state where the old one left it.
    pub fn with_registry(mut self, registry: Arc<ThrottleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the sink records are written to.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(Some(sink));
        self
    }

    /// Start without a sink; records are dropped until one is attached.
    pub fn without_sink(mut self) -> Self {
        self.sink = Some(None);
        self
    }

    /// Set how identities are derived from throttled calls.
    pub fn with_identity_policy(mut self, policy: IdentityPolicy) -> Self {
        self.identity_policy = policy;
        self
    }

    /// Configure the sink circuit breaker.
    pub fn with_circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = config;
        self
    }

    /// Report into existing metrics. Ignored when a registry is supplied,
    /// since the router shares the registry's metrics.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the router.
    ///
    /// # Errors
    /// Returns `BuildError` if the configuration is invalid.
    pub fn build(self) -> Result<SeverityRouter, BuildError> {
        let registry = match self.registry {
            Some(registry) => {
                if self.max_size.is_some() || self.clear_ratio.is_some() {
                    return Err(BuildError::ConflictingRegistry);
                }
                registry
            }
            None => {
                let limits = CacheLimits::new(
                    self.max_size.unwrap_or(DEFAULT_MAX_SIZE),
                    self.clear_ratio.unwrap_or(DEFAULT_CLEAR_RATIO),
                )?;
                Arc::new(ThrottleRegistry::with_metrics(
                    limits,
                    self.metrics.unwrap_or_default(),
                ))
            }
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let sink = self
            .sink
            .unwrap_or_else(|| Some(Arc::new(TracingSink::new())));
        let circuit_breaker = Arc::new(CircuitBreaker::with_config(self.circuit_breaker_config));

        Ok(SeverityRouter::new(
            registry,
            clock,
            sink,
            self.identity_policy,
            circuit_breaker,
        ))
    }
}

impl SeverityRouter {
    /// Create a builder for configuring the router.
    pub fn builder() -> SeverityRouterBuilder {
        SeverityRouterBuilder::new()
    }
}

impl Default for SeverityRouter {
    /// Router with default limits writing to `tracing`.
    fn default() -> Self {
        let registry = Arc::new(ThrottleRegistry::default());
        SeverityRouter::new(
            registry,
            Arc::new(SystemClock::new()),
            Some(Arc::new(TracingSink::new())),
            IdentityPolicy::default(),
            Arc::new(CircuitBreaker::new()),
        )
    }
}
