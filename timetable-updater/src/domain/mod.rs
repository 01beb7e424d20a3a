//! Domain types for the realtime timetable updater.
//!
//! This module contains the core model: feed-scoped identifiers, service
//! times, static schedule entities, and the realized timetable rows that
//! realtime updates produce. Types that can be invalid enforce their
//! invariants at construction time.

mod call;
mod id;
mod row;
mod state;
mod time;
mod trip;

pub use call::{Call, CallFlags, CallIndex};
pub use id::{FeedScopedId, InvalidFeedScopedId};
pub use row::RealizedTimetableRow;
pub use state::{RealTimeState, StateChange};
pub use time::{ServiceTime, TimeError};
pub use trip::{Route, ScheduledStopTime, StaticTrip, Stop, StopPattern, TripKey};
