//! Realtime state of a timetable row and its transitions.

use std::fmt;

use serde::Serialize;

/// Aggregate realtime state of one trip on one service date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealTimeState {
    /// No realtime information applied.
    #[default]
    Scheduled,
    /// Same stops as scheduled, different times.
    Updated,
    /// Stops replaced by siblings or individually cancelled.
    Modified,
    /// The whole trip is cancelled.
    Canceled,
    /// Not in the static schedule; introduced by a realtime feed.
    Added,
}

/// A change applied to a row by one journey update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    CancelTrip,
    AddJourney,
    ModifyStops,
    UpdateTimes,
}

impl RealTimeState {
    /// Returns the state after applying a change.
    ///
    /// Cancellation and addition always win. An added trip stays added when
    /// later updates revise its stops or times; it never becomes an
    /// updated scheduled trip.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_updater::domain::{RealTimeState, StateChange};
    ///
    /// let state = RealTimeState::Scheduled.apply(StateChange::UpdateTimes);
    /// assert_eq!(state, RealTimeState::Updated);
    ///
    /// let state = state.apply(StateChange::ModifyStops);
    /// assert_eq!(state, RealTimeState::Modified);
    ///
    /// assert_eq!(RealTimeState::Added.apply(StateChange::UpdateTimes), RealTimeState::Added);
    /// ```
    pub fn apply(self, change: StateChange) -> Self {
        match (self, change) {
            (_, StateChange::CancelTrip) => RealTimeState::Canceled,
            (_, StateChange::AddJourney) => RealTimeState::Added,
            (RealTimeState::Added, StateChange::ModifyStops | StateChange::UpdateTimes) => {
                RealTimeState::Added
            }
            (_, StateChange::ModifyStops) => RealTimeState::Modified,
            (_, StateChange::UpdateTimes) => RealTimeState::Updated,
        }
    }

    /// Returns the encoding label, e.g. `CANCELED`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RealTimeState::Scheduled => "SCHEDULED",
            RealTimeState::Updated => "UPDATED",
            RealTimeState::Modified => "MODIFIED",
            RealTimeState::Canceled => "CANCELED",
            RealTimeState::Added => "ADDED",
        }
    }
}

impl fmt::Display for RealTimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
