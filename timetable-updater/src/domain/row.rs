//! Realized timetable rows.

use std::fmt;
use std::sync::Arc;

use super::{Call, RealTimeState, StateChange, StaticTrip, StopPattern, TripKey};

/// The realized timetable of one trip on one service date.
///
/// Rows are immutable once staged: every update produces a new row, and
/// published snapshot versions share rows behind `Arc`.
///
/// Rendered as `STATE | call | call ...`, where each call is
/// `STOP [FLAGS] ARR DEP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealizedTimetableRow {
    pub key: TripKey,
    pub pattern: Arc<StopPattern>,
    pub calls: Vec<Call>,
    pub state: RealTimeState,
}

impl RealizedTimetableRow {
    /// Builds the scheduled row of a trip on a service date.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use chrono::NaiveDate;
    /// use timetable_updater::domain::{
    ///     FeedScopedId, RealizedTimetableRow, ScheduledStopTime, ServiceTime, StaticTrip,
    ///     StopPattern, TripKey,
    /// };
    ///
    /// let id = |s: &str| FeedScopedId::new("F", s).unwrap();
    /// let t = ServiceTime::from_seconds;
    /// let trip = StaticTrip {
    ///     id: id("TestTrip1"),
    ///     route_id: id("R1"),
    ///     service_id: id("S1"),
    ///     pattern_id: id("P1"),
    ///     stop_times: vec![
    ///         ScheduledStopTime::new(id("A1"), t(10), t(11)),
    ///         ScheduledStopTime::new(id("B1"), t(20), t(21)),
    ///     ],
    /// };
    /// let pattern = Arc::new(StopPattern::new(id("P1"), vec![id("A1"), id("B1")]));
    /// let key = TripKey::new(trip.id.clone(), NaiveDate::from_ymd_opt(2024, 5, 8).unwrap());
    ///
    /// let row = RealizedTimetableRow::from_trip(key, &trip, pattern);
    /// assert_eq!(row.to_string(), "SCHEDULED | A1 0:00:10 0:00:11 | B1 0:00:20 0:00:21");
    /// ```
    pub fn from_trip(key: TripKey, trip: &StaticTrip, pattern: Arc<StopPattern>) -> Self {
        let calls = trip
            .stop_times
            .iter()
            .map(|st| Call::scheduled(st.stop.clone(), st.arrival, st.departure))
            .collect();
        Self {
            key,
            pattern,
            calls,
            state: RealTimeState::Scheduled,
        }
    }

    /// Returns a copy with every call cancelled and state `CANCELED`.
    pub fn cancelled(&self) -> Self {
        let calls = self
            .calls
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.flags.cancelled = true;
                c
            })
            .collect();
        Self {
            key: self.key.clone(),
            pattern: Arc::clone(&self.pattern),
            calls,
            state: self.state.apply(StateChange::CancelTrip),
        }
    }

    /// Returns the row as planned, with realtime times and flags removed.
    ///
    /// For added trips the planned times are the aimed times the feed
    /// supplied when the trip was introduced.
    pub fn scheduled_view(&self) -> Self {
        Self {
            key: self.key.clone(),
            pattern: Arc::clone(&self.pattern),
            calls: self.calls.iter().map(Call::as_scheduled).collect(),
            state: RealTimeState::Scheduled,
        }
    }

    /// Returns true if the whole trip is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state == RealTimeState::Canceled
    }

    /// Returns the number of calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns true if the row has no calls.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl fmt::Display for RealizedTimetableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        for call in &self.calls {
            write!(f, " | {}", call)?;
        }
        Ok(())
    }
}
