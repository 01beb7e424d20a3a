//! Trip identity resolution.
//!
//! A journey update names the journey it is about in one of several
//! reference schemes. Each scheme is tried in a fixed priority order; the
//! first that names a trip whose service runs on the resolved date wins.
//! Updates without usable references may fall back to [`FuzzyMatcher`].

mod fuzzy;

pub use fuzzy::FuzzyMatcher;

use tracing::trace;

use crate::domain::{FeedScopedId, TripKey};
use crate::feed::JourneyUpdate;
use crate::schedule::ScheduleIndex;

/// A reference scheme for naming a journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyReference {
    /// A dated vehicle journey id, which fixes both trip and service date.
    Dated,
    /// A trip id qualified by the service date of its data frame.
    Framed,
}

impl JourneyReference {
    /// Reference schemes in the order they are tried.
    pub const PRIORITY: [JourneyReference; 2] = [JourneyReference::Dated, JourneyReference::Framed];

    /// Returns the key this scheme names, if the update carries it.
    ///
    /// The key is not checked against the service calendar.
    fn key_for(self, feed_id: &str, update: &JourneyUpdate, schedule: &ScheduleIndex) -> Option<TripKey> {
        match self {
            JourneyReference::Dated => {
                let dated = update.dated_vehicle_journey_ref.as_deref()?;
                let id = FeedScopedId::new(feed_id, dated).ok()?;
                let (trip_id, date) = schedule.dated_journey(&id)?;
                Some(TripKey::new(trip_id.clone(), date))
            }
            JourneyReference::Framed => {
                let framed = update.framed_vehicle_journey_ref.as_ref()?;
                let id = FeedScopedId::new(feed_id, framed.vehicle_journey_ref.as_str()).ok()?;
                Some(TripKey::new(id, framed.service_date))
            }
        }
    }
}

/// Outcome of resolving an update against the static schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(TripKey),
    NotFound,
}

/// Resolves journey references of one feed to trip runs.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use timetable_updater::domain::{FeedScopedId, Route, ScheduledStopTime, ServiceTime, Stop, TripKey};
/// use timetable_updater::feed::JourneyUpdate;
/// use timetable_updater::resolve::{Resolution, TripResolver};
/// use timetable_updater::schedule::ScheduleIndexBuilder;
///
/// let id = |s: &str| FeedScopedId::new("F", s).unwrap();
/// let t = ServiceTime::from_seconds;
/// let date = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
/// let index = ScheduleIndexBuilder::new()
///     .stop(Stop::new(id("A1"), "A1"))
///     .stop(Stop::new(id("B1"), "B1"))
///     .route(Route::new(id("R1"), "Line 1"))
///     .service(id("S1"), [date])
///     .trip(id("T1"), id("R1"), id("S1"), vec![
///         ScheduledStopTime::new(id("A1"), t(10), t(11)),
///         ScheduledStopTime::new(id("B1"), t(20), t(21)),
///     ])
///     .build()
///     .unwrap();
///
/// let resolver = TripResolver::new("F", &index);
/// let update = JourneyUpdate::default().framed(date, "T1");
/// assert_eq!(resolver.resolve(&update), Resolution::Found(TripKey::new(id("T1"), date)));
///
/// let update = JourneyUpdate::default().framed(date, "XXX");
/// assert_eq!(resolver.resolve(&update), Resolution::NotFound);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TripResolver<'a> {
    feed_id: &'a str,
    schedule: &'a ScheduleIndex,
}

impl<'a> TripResolver<'a> {
    pub fn new(feed_id: &'a str, schedule: &'a ScheduleIndex) -> Self {
        Self { feed_id, schedule }
    }

    /// Resolves an update's references in priority order.
    ///
    /// A scheme whose trip does not run on the resolved date does not stop
    /// the search; the next scheme is tried.
    pub fn resolve(&self, update: &JourneyUpdate) -> Resolution {
        for reference in JourneyReference::PRIORITY {
            let Some(key) = reference.key_for(self.feed_id, update, self.schedule) else {
                continue;
            };
            if self.schedule.runs_on(&key.trip_id, key.service_date) {
                trace!(?reference, trip = %key, "Resolved journey reference");
                return Resolution::Found(key);
            }
            trace!(?reference, trip = %key, "Referenced trip does not run on date");
        }
        Resolution::NotFound
    }
}
