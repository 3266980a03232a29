// crates/manifest-trust-core/src/time.rs
// ============================================================================
// Module: Manifest Trust Time Model
// Description: Canonical timestamp representation for manifests, keys, and audit.
// Purpose: Provide explicit, serializable time values with RFC 3339 interop.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Timestamps are unix epoch milliseconds. Library code takes time values as
//! explicit arguments; only host-facing entry points (service facade, cache
//! fetch bookkeeping, and default signing paths) read the wall clock through
//! [`Timestamp::now`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds.
///
/// # Invariants
/// - Arithmetic saturates rather than wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

/// Errors raised when parsing timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// Input is not valid RFC 3339.
    #[error("invalid rfc3339 timestamp: {0}")]
    Parse(String),
    /// Timestamp is outside the representable millisecond range.
    #[error("timestamp out of range")]
    OutOfRange,
}

impl Timestamp {
    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp shifted by `millis` (saturating).
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns the timestamp shifted by whole days (saturating).
    #[must_use]
    pub const fn saturating_add_days(self, days: i64) -> Self {
        self.saturating_add_millis(days.saturating_mul(MILLIS_PER_DAY))
    }

    /// Parses an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when the input is malformed or out of range.
    pub fn parse_rfc3339(value: &str) -> Result<Self, TimestampError> {
        let parsed = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|err| TimestampError::Parse(err.to_string()))?;
        let millis = parsed.unix_timestamp_nanos() / 1_000_000;
        i64::try_from(millis).map(Self).map_err(|_| TimestampError::OutOfRange)
    }

    /// Formats the timestamp as RFC 3339 (UTC).
    ///
    /// Returns `None` when the value is outside the calendar range.
    #[must_use]
    pub fn to_rfc3339(self) -> Option<String> {
        let nanos = i128::from(self.0) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?.format(&Rfc3339).ok()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(value) => f.write_str(&value),
            None => write!(f, "{}ms", self.0),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
