//! Service-day relative times.
//!
//! Schedules express stop times as offsets from the start of the service
//! day rather than wall-clock instants. Overnight trips therefore carry
//! times past "24:00", and a trip's times are only meaningful together with
//! its service date.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Seconds since the start of a service day.
///
/// Negative values are allowed: a realtime feed may report a trip running
/// ahead of a schedule that starts at midnight.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::ServiceTime;
///
/// let t = ServiceTime::parse("00:00:15").unwrap();
/// assert_eq!(t.seconds(), 15);
/// assert_eq!(t.to_string(), "0:00:15");
///
/// // Seconds are omitted when zero
/// let t = ServiceTime::parse("00:02").unwrap();
/// assert_eq!(t.seconds(), 120);
/// assert_eq!(t.to_string(), "0:02");
///
/// // Overnight times run past 24:00
/// let t = ServiceTime::parse("25:10").unwrap();
/// assert_eq!(t.to_string(), "25:10");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceTime(i32);

impl ServiceTime {
    /// Create a time from a number of seconds since service-day start.
    pub const fn from_seconds(seconds: i32) -> Self {
        Self(seconds)
    }

    /// Create a time from hours, minutes and seconds.
    pub const fn from_hms(hours: i32, minutes: i32, seconds: i32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    /// Parse `H:MM`, `HH:MM` or `HH:MM:SS`.
    ///
    /// Hours are not bounded to 23 so that overnight service can be
    /// expressed; minutes and seconds must be 0-59.
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let mut parts = body.split(':');
        let hours = parse_component(parts.next(), "missing hours")?;
        let minutes = parse_component(parts.next(), "missing minutes")?;
        let seconds = match parts.next() {
            Some(p) => parse_component(Some(p), "missing seconds")?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(TimeError::new("too many components"));
        }
        if minutes > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }
        if seconds > 59 {
            return Err(TimeError::new("second must be 0-59"));
        }

        let total = hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60 + seconds))
            .ok_or_else(|| TimeError::new("time overflow"))?;
        Ok(Self(if negative { -total } else { total }))
    }

    /// Returns the number of seconds since service-day start.
    pub const fn seconds(&self) -> i32 {
        self.0
    }

    /// Returns this time shifted by the given number of seconds.
    pub const fn plus_seconds(&self, seconds: i32) -> Self {
        Self(self.0 + seconds)
    }

    /// Returns `self - other` in seconds.
    pub const fn seconds_since(&self, other: Self) -> i32 {
        self.0 - other.0
    }

    /// Returns the duration between two times.
    ///
    /// Returns a negative duration if `other` is after `self`.
    pub fn signed_duration_since(&self, other: Self) -> Duration {
        Duration::seconds(i64::from(self.seconds_since(other)))
    }

    /// Resolve to a wall-clock instant on the given service date.
    pub fn on(&self, service_date: NaiveDate) -> NaiveDateTime {
        service_date.and_time(chrono::NaiveTime::MIN) + Duration::seconds(i64::from(self.0))
    }
}

impl Add<Duration> for ServiceTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.num_seconds() as i32)
    }
}

impl fmt::Debug for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceTime({})", self)
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let h = abs / 3600;
        let m = (abs % 3600) / 60;
        let s = abs % 60;
        if s == 0 {
            write!(f, "{sign}{h}:{m:02}")
        } else {
            write!(f, "{sign}{h}:{m:02}:{s:02}")
        }
    }
}

impl TryFrom<String> for ServiceTime {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServiceTime> for String {
    fn from(value: ServiceTime) -> Self {
        value.to_string()
    }
}

/// Parse one colon-separated numeric component.
fn parse_component(part: Option<&str>, missing: &'static str) -> Result<i32, TimeError> {
    let part = part.ok_or_else(|| TimeError::new(missing))?;
    if part.is_empty() || part.len() > 4 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeError::new("expected digits"));
    }
    part.parse().map_err(|_| TimeError::new("expected digits"))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Display then parse returns the original time
        #[test]
        fn display_parse_roundtrip(secs in -200_000i32..200_000) {
            let t = ServiceTime::from_seconds(secs);
            prop_assert_eq!(ServiceTime::parse(&t.to_string()).unwrap(), t);
        }

        /// Ordering agrees with seconds
        #[test]
        fn ordering_consistent(a in -100_000i32..100_000, b in -100_000i32..100_000) {
            let ta = ServiceTime::from_seconds(a);
            let tb = ServiceTime::from_seconds(b);
            prop_assert_eq!(ta.cmp(&tb), a.cmp(&b));
        }
    }
}
