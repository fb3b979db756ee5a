//! Clocks and timestamp helpers.
//!
//! Fact timestamps are kept at millisecond precision: that is the resolution
//! of the numerical `date_time` projection and of generated identifiers.

use std::fmt;

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};

/// Source of the current time.
///
/// Injected into fact factories and the item drive so identifier
/// generation and default timestamps are deterministic under test.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_to_millis(Utc::now())
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(at))
    }

    /// A clock frozen at `millis` milliseconds after the Unix epoch.
    ///
    /// Out-of-range values fall back to the epoch.
    #[must_use]
    pub fn at_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Drops sub-millisecond precision.
#[must_use]
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(at)
}

/// ISO-8601 rendering with millisecond precision and a `Z` suffix,
/// e.g. `2001-03-24T00:00:00.000Z`.
#[must_use]
pub fn to_iso_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
