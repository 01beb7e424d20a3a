//! Calling point types for realized timetables.
//!
//! A `Call` is one stop of a trip on a specific service date, carrying both
//! the scheduled times and the realized (estimated or recorded) times. A
//! `CallIndex` gives an unambiguous position within a trip's pattern.

use std::fmt;

use super::{FeedScopedId, ServiceTime};

/// Index of a call within a trip's stop pattern.
///
/// Used instead of the stop id to disambiguate trips that call at the same
/// stop more than once (loops, out-and-back workings).
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::CallIndex;
///
/// let idx = CallIndex(0);
/// assert_eq!(idx.next(), CallIndex(1));
/// assert_eq!(idx.prev(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallIndex(pub usize);

impl CallIndex {
    /// Returns the next index.
    pub fn next(self) -> Self {
        CallIndex(self.0 + 1)
    }

    /// Returns the previous index, if any.
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(CallIndex)
    }
}

impl fmt::Display for CallIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for CallIndex {
    fn from(value: usize) -> Self {
        CallIndex(value)
    }
}

/// Per-call realtime flags.
///
/// Rendered in row encodings as a bracketed, comma-separated list in the
/// fixed order `C`, `R`, `PI`, `ND`. The `extra` flag is not rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CallFlags {
    /// The vehicle will not serve this stop.
    pub cancelled: bool,
    /// Times are observed rather than predicted.
    pub recorded: bool,
    /// The producer flagged its prediction as unreliable.
    pub prediction_inaccurate: bool,
    /// The producer has no realtime data for this stop.
    pub no_data: bool,
    /// The stop was not part of the planned journey.
    pub extra: bool,
}

impl CallFlags {
    /// Returns true if no rendered flag is set.
    pub fn is_plain(&self) -> bool {
        !(self.cancelled || self.recorded || self.prediction_inaccurate || self.no_data)
    }
}

impl fmt::Display for CallFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = [
            (self.cancelled, "C"),
            (self.recorded, "R"),
            (self.prediction_inaccurate, "PI"),
            (self.no_data, "ND"),
        ];
        let mut first = true;
        for (_, label) in labels.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(label)?;
            first = false;
        }
        Ok(())
    }
}

/// A stop on a trip with scheduled and realized times.
///
/// # Time Semantics
///
/// - Scheduled times come from the static schedule (or, for added trips,
///   from the aimed times of the feed message).
/// - Realized times start out equal to the scheduled ones and are replaced
///   by estimated or recorded times as updates arrive.
/// - A cancelled call keeps its times so the row can still be displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Stop served (possibly a sibling of the scheduled stop)
    pub stop: FeedScopedId,
    pub scheduled_arrival: ServiceTime,
    pub scheduled_departure: ServiceTime,
    /// Realized (estimated or recorded) arrival
    pub arrival: ServiceTime,
    /// Realized (estimated or recorded) departure
    pub departure: ServiceTime,
    pub flags: CallFlags,
}

impl Call {
    /// Creates a call whose realized times equal its scheduled times.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_updater::domain::{Call, FeedScopedId, ServiceTime};
    ///
    /// let stop = FeedScopedId::new("F", "A1").unwrap();
    /// let call = Call::scheduled(stop, ServiceTime::from_seconds(10), ServiceTime::from_seconds(11));
    ///
    /// assert_eq!(call.arrival.seconds(), 10);
    /// assert_eq!(call.departure_delay(), 0);
    /// assert_eq!(call.to_string(), "A1 0:00:10 0:00:11");
    /// ```
    pub fn scheduled(stop: FeedScopedId, arrival: ServiceTime, departure: ServiceTime) -> Self {
        Self {
            stop,
            scheduled_arrival: arrival,
            scheduled_departure: departure,
            arrival,
            departure,
            flags: CallFlags::default(),
        }
    }

    /// Returns true if this call is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled
    }

    /// Returns the arrival delay in seconds (negative when early).
    pub fn arrival_delay(&self) -> i32 {
        self.arrival.seconds_since(self.scheduled_arrival)
    }

    /// Returns the departure delay in seconds (negative when early).
    pub fn departure_delay(&self) -> i32 {
        self.departure.seconds_since(self.scheduled_departure)
    }

    /// Returns a copy with realized times reset to scheduled and no flags.
    pub fn as_scheduled(&self) -> Self {
        Self::scheduled(
            self.stop.clone(),
            self.scheduled_arrival,
            self.scheduled_departure,
        )
    }
}

/// Renders `STOP [FLAGS] ARR DEP`, omitting the flag block when empty.
///
/// Only the local part of the stop id is rendered.
impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stop.id())?;
        if !self.flags.is_plain() {
            write!(f, " [{}]", self.flags)?;
        }
        write!(f, " {} {}", self.arrival, self.departure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(s: &str) -> FeedScopedId {
        FeedScopedId::new("F", s).unwrap()
    }

    fn time(s: &str) -> ServiceTime {
        ServiceTime::parse(s).unwrap()
    }

    #[test]
    fn call_index_next_prev() {
        assert_eq!(CallIndex(5).next(), CallIndex(6));
        assert_eq!(CallIndex(5).prev(), Some(CallIndex(4)));
        assert_eq!(CallIndex(0).prev(), None);
        assert_eq!(CallIndex(42).to_string(), "42");
    }

    #[test]
    fn scheduled_call_has_no_delay() {
        let call = Call::scheduled(stop("A1"), time("0:00:10"), time("0:00:11"));
        assert_eq!(call.arrival, call.scheduled_arrival);
        assert_eq!(call.arrival_delay(), 0);
        assert_eq!(call.departure_delay(), 0);
        assert!(!call.is_cancelled());
    }

    #[test]
    fn delays_are_signed() {
        let mut call = Call::scheduled(stop("A1"), time("0:10"), time("0:11"));
        call.arrival = time("0:12");
        call.departure = time("0:10:30");
        assert_eq!(call.arrival_delay(), 120);
        assert_eq!(call.departure_delay(), -30);
    }

    #[test]
    fn as_scheduled_clears_realtime() {
        let mut call = Call::scheduled(stop("B1"), time("0:20"), time("0:21"));
        call.arrival = time("0:25");
        call.flags.cancelled = true;
        let reset = call.as_scheduled();
        assert_eq!(reset.arrival, time("0:20"));
        assert!(reset.flags.is_plain());
    }

    #[test]
    fn display_without_flags() {
        let call = Call::scheduled(stop("B1"), time("0:00:20"), time("0:00:21"));
        assert_eq!(call.to_string(), "B1 0:00:20 0:00:21");
    }

    #[test]
    fn display_flags_in_fixed_order() {
        let mut call = Call::scheduled(stop("A1"), time("0:02"), time("0:02"));
        call.flags.recorded = true;
        assert_eq!(call.to_string(), "A1 [R] 0:02 0:02");

        call.flags.no_data = true;
        call.flags.cancelled = true;
        call.flags.prediction_inaccurate = true;
        assert_eq!(call.to_string(), "A1 [C,R,PI,ND] 0:02 0:02");
    }

    #[test]
    fn extra_flag_is_not_rendered() {
        let mut call = Call::scheduled(stop("D1"), time("0:04"), time("0:04"));
        call.flags.extra = true;
        assert!(call.flags.is_plain());
        assert_eq!(call.to_string(), "D1 0:04 0:04");
    }
}
