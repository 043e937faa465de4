//! Domain layer - pure types with no I/O and no clock access.
//!
//! This layer holds the concepts the throttling cache is built from:
//! - Severities and log identities
//! - Throttle intervals and per-identity entries
//! - Cache limits and their validation
//! - Log records handed to sinks
//!
//! Every function here is deterministic; time is always passed in.

pub mod entry;
pub mod identity;
pub mod interval;
pub mod limits;
pub mod record;
pub mod severity;
