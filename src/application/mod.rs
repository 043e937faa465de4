//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Throttle registry (bounded cache of last-emitted timestamps)
//! - Severity router (throttled and direct emission to a sink)
//! - Metrics and the sink circuit breaker
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod circuit_breaker;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod router;
