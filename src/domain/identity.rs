//! Log identity computation for throttled calls.
//!
//! A log identity decides which throttled calls count as "the same event".
//! It is derived from one key (the call site or the message text) and,
//! if the [`IdentityPolicy`] asks for it, the severity.
//!
//! Identities are plain 64-bit digests: computing one allocates nothing
//! and has no side effects.

use crate::domain::severity::Severity;
use ahash::AHasher;
use serde::Deserialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;

/// Source location of a log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Source file
    pub file: &'static str,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl CallSite {
    /// Capture the location of the caller.
    ///
    /// Inside a `#[track_caller]` chain this resolves to the outermost
    /// non-tracking frame, i.e. the user's log statement.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Which part of a call keys its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKey {
    /// The message text. Calls that interpolate changing values into the
    /// message produce a new identity each time.
    #[default]
    Message,
    /// The call site, falling back to the message text when the call site
    /// is unknown. Changing message text from one statement dedups as one.
    CallSite,
}

/// How identities are composed from a throttled call.
///
/// The default keys by message text and ignores severity, so the same text
/// logged as an error and as a warning shares one throttle window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct IdentityPolicy {
    /// Key source
    pub key: IdentityKey,
    /// Track each severity of the same key separately
    pub include_severity: bool,
}

impl IdentityPolicy {
    /// Key by message text.
    pub fn by_message() -> Self {
        Self::default()
    }

    /// Key by call site, falling back to message text.
    pub fn by_call_site() -> Self {
        Self {
            key: IdentityKey::CallSite,
            include_severity: false,
        }
    }

    /// Also mix the severity into the identity.
    pub fn with_severity(mut self, include: bool) -> Self {
        self.include_severity = include;
        self
    }

    /// Derive the identity of a throttled call.
    pub fn identify(
        &self,
        severity: Severity,
        message: &str,
        call_site: Option<&CallSite>,
    ) -> LogIdentity {
        let severity = self.include_severity.then_some(severity);
        match (self.key, call_site) {
            (IdentityKey::CallSite, Some(site)) => LogIdentity::from_call_site(site, severity),
            _ => LogIdentity::new(message, severity),
        }
    }
}

/// Dedup key of a throttled log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogIdentity(u64);

impl LogIdentity {
    /// Compute an identity from a key string and an optional severity.
    ///
    /// Uses ahash with its fixed default keys, so the same inputs give the
    /// same identity for the lifetime of the build.
    pub fn new(key: &str, severity: Option<Severity>) -> Self {
        let mut hasher = AHasher::default();
        0u8.hash(&mut hasher);
        key.hash(&mut hasher);
        severity.hash(&mut hasher);
        LogIdentity(hasher.finish())
    }

    /// Identity of a bare key, severity ignored.
    pub fn simple(key: &str) -> Self {
        Self::new(key, None)
    }

    /// Identity of a call site.
    ///
    /// Domain-separated from message identities so a message that happens
    /// to read like `file:line:col` cannot collide with a real call site.
    pub fn from_call_site(site: &CallSite, severity: Option<Severity>) -> Self {
        let mut hasher = AHasher::default();
        1u8.hash(&mut hasher);
        site.hash(&mut hasher);
        severity.hash(&mut hasher);
        LogIdentity(hasher.finish())
    }

    /// Get the raw digest.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
