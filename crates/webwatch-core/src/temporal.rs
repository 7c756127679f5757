//! # Temporal Types — Record Timestamps
//!
//! Defines `Timestamp`, the UTC instant attached to every observation.
//!
//! ## Round-Trip Invariant
//!
//! Timestamps are written into the observation log as
//! `YYYY-MM-DD HH:MM:SS.ffffff+ZZZZ` (six fractional digits, numeric
//! offset). The type truncates to microseconds at construction, so the value
//! read back from the log is equal to the value written.
//!
//! Parsing accepts any numeric offset and normalizes to UTC; formatting
//! always emits `+0000`.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValueError;

/// Format used when writing a timestamp into the observation log.
pub const RECORD_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%z";

const RECORD_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%z";

/// A UTC instant with microsecond precision.
///
/// Serializes as its record string, the same text that appears inside the
/// log's `__date` wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current time, truncated to microseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Wrap a `DateTime<Utc>`, discarding sub-microsecond precision.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_micros(dt))
    }

    /// Parse the record format (`2026-01-15 12:00:00.123456+0000`).
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidTimestamp`] if the string does not match.
    pub fn parse_record(s: &str) -> Result<Self, ValueError> {
        let dt = DateTime::parse_from_str(s, RECORD_PARSE_FORMAT).map_err(|e| {
            ValueError::InvalidTimestamp {
                input: s.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// Render in the record format.
    pub fn to_record_string(&self) -> String {
        self.0.format(RECORD_FORMAT).to_string()
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_record_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_record_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_record(&text).map_err(serde::de::Error::custom)
    }
}

fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = dt.nanosecond();
    dt.with_nanosecond(nanos - nanos % 1_000).unwrap_or(dt)
}
