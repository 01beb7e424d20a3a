//! Static schedule entities: stops, routes, patterns and trips.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{FeedScopedId, ServiceTime};

/// A boarding location.
///
/// Stops sharing a parent station are siblings: quays or platforms of one
/// station that a vehicle may be moved between at short notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    pub id: FeedScopedId,
    pub name: String,
    /// Parent station, if this stop is one quay of a larger station
    pub station: Option<FeedScopedId>,
}

impl Stop {
    pub fn new(id: FeedScopedId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            station: None,
        }
    }

    /// Sets the parent station.
    pub fn with_station(mut self, station: FeedScopedId) -> Self {
        self.station = Some(station);
        self
    }

    /// Returns true if both stops belong to the same parent station.
    ///
    /// A stop is not its own sibling, and stops without a station have no
    /// siblings.
    pub fn is_sibling_of(&self, other: &Stop) -> bool {
        self.id != other.id
            && match (&self.station, &other.station) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
    }
}

/// A named line that trips belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub id: FeedScopedId,
    pub name: String,
}

impl Route {
    pub fn new(id: FeedScopedId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// An ordered sequence of stops shared by structurally identical trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPattern {
    pub id: FeedScopedId,
    pub stops: Vec<FeedScopedId>,
}

impl StopPattern {
    pub fn new(id: FeedScopedId, stops: Vec<FeedScopedId>) -> Self {
        Self { id, stops }
    }

    /// Returns the number of stops.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Returns true if the pattern has no stops.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// A scheduled stop time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledStopTime {
    pub stop: FeedScopedId,
    pub arrival: ServiceTime,
    pub departure: ServiceTime,
}

impl ScheduledStopTime {
    pub fn new(stop: FeedScopedId, arrival: ServiceTime, departure: ServiceTime) -> Self {
        Self {
            stop,
            arrival,
            departure,
        }
    }
}

/// A trip from the static schedule, or one added by a realtime feed.
///
/// Immutable once built; shared behind `Arc` by the schedule index and
/// every snapshot version that refers to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTrip {
    pub id: FeedScopedId,
    pub route_id: FeedScopedId,
    pub service_id: FeedScopedId,
    pub pattern_id: FeedScopedId,
    pub stop_times: Vec<ScheduledStopTime>,
}

impl StaticTrip {
    /// Returns the stop ids in calling order.
    pub fn stops(&self) -> impl Iterator<Item = &FeedScopedId> {
        self.stop_times.iter().map(|st| &st.stop)
    }

    /// Returns the scheduled departure from the first stop.
    pub fn first_departure(&self) -> Option<ServiceTime> {
        self.stop_times.first().map(|st| st.departure)
    }
}

/// Identifies one run of a trip: the trip id plus its service date.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::{FeedScopedId, TripKey};
/// use chrono::NaiveDate;
///
/// let key = TripKey::new(
///     FeedScopedId::new("F", "TestTrip1").unwrap(),
///     NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
/// );
/// assert_eq!(key.to_string(), "F:TestTrip1@2024-05-08");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripKey {
    pub trip_id: FeedScopedId,
    pub service_date: NaiveDate,
}

impl TripKey {
    pub fn new(trip_id: FeedScopedId, service_date: NaiveDate) -> Self {
        Self {
            trip_id,
            service_date,
        }
    }

    /// Returns the feed the trip belongs to.
    pub fn feed_id(&self) -> &str {
        self.trip_id.feed_id()
    }
}

impl fmt::Display for TripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.trip_id, self.service_date)
    }
}
