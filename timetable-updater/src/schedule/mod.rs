//! Read-only index over the static schedule.
//!
//! The index is built once, up front, by [`ScheduleIndexBuilder`] and then
//! shared behind `Arc` by every feed updater. Building validates all cross
//! references and groups trips into stop patterns by their stop sequence,
//! so lookups during realtime processing never fail on dangling ids.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{
    FeedScopedId, RealizedTimetableRow, Route, ScheduledStopTime, StaticTrip, Stop, StopPattern,
    TripKey,
};
use crate::timetable::{TimeViolation, validate_times};

/// Errors from building a schedule index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("duplicate trip {0}")]
    DuplicateTrip(FeedScopedId),

    #[error("trip {trip} refers to unknown route {route}")]
    UnknownRoute {
        trip: FeedScopedId,
        route: FeedScopedId,
    },

    #[error("trip {trip} refers to unknown service {service}")]
    UnknownService {
        trip: FeedScopedId,
        service: FeedScopedId,
    },

    #[error("trip {trip} calls at unknown stop {stop}")]
    UnknownStop {
        trip: FeedScopedId,
        stop: FeedScopedId,
    },

    #[error("trip {0} has fewer than two stop times")]
    TooFewStops(FeedScopedId),

    #[error("trip {trip} has inconsistent stop times: {violation}")]
    InvalidStopTimes {
        trip: FeedScopedId,
        violation: TimeViolation,
    },

    #[error("dated journey {journey} refers to unknown trip {trip}")]
    UnknownDatedTrip {
        journey: FeedScopedId,
        trip: FeedScopedId,
    },
}

/// A dated vehicle journey: one trip on one explicit service date.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DatedJourney {
    trip_id: FeedScopedId,
    service_date: NaiveDate,
}

/// Collects static schedule entities and builds a [`ScheduleIndex`].
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use timetable_updater::domain::{FeedScopedId, Route, ScheduledStopTime, ServiceTime, Stop};
/// use timetable_updater::schedule::ScheduleIndexBuilder;
///
/// let id = |s: &str| FeedScopedId::new("F", s).unwrap();
/// let t = ServiceTime::from_seconds;
/// let date = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
///
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
/// assert!(index.runs_on(&id("T1"), date));
/// assert_eq!(index.trips_at_stop(&id("B1")).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ScheduleIndexBuilder {
    stops: Vec<Stop>,
    routes: Vec<Route>,
    services: HashMap<FeedScopedId, BTreeSet<NaiveDate>>,
    trips: Vec<PendingTrip>,
    dated_journeys: Vec<(FeedScopedId, DatedJourney)>,
}

#[derive(Debug)]
struct PendingTrip {
    id: FeedScopedId,
    route_id: FeedScopedId,
    service_id: FeedScopedId,
    stop_times: Vec<ScheduledStopTime>,
}

impl ScheduleIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stop.
    pub fn stop(mut self, stop: Stop) -> Self {
        self.stops.push(stop);
        self
    }

    /// Adds a route.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds dates on which a service runs. Repeated calls accumulate.
    pub fn service(mut self, id: FeedScopedId, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.services.entry(id).or_default().extend(dates);
        self
    }

    /// Adds a trip. Its pattern is assigned at build time.
    pub fn trip(
        mut self,
        id: FeedScopedId,
        route_id: FeedScopedId,
        service_id: FeedScopedId,
        stop_times: Vec<ScheduledStopTime>,
    ) -> Self {
        self.trips.push(PendingTrip {
            id,
            route_id,
            service_id,
            stop_times,
        });
        self
    }

    /// Adds a dated vehicle journey id for a trip on a service date.
    pub fn dated_journey(
        mut self,
        id: FeedScopedId,
        trip_id: FeedScopedId,
        service_date: NaiveDate,
    ) -> Self {
        self.dated_journeys.push((
            id,
            DatedJourney {
                trip_id,
                service_date,
            },
        ));
        self
    }

    /// Validates references and builds the index.
    ///
    /// Trips of one route with the same stop sequence share a pattern.
    /// Patterns never span routes, so the `route:n` ids name their route.
    pub fn build(self) -> Result<ScheduleIndex, ScheduleError> {
        let stops: HashMap<_, _> = self.stops.into_iter().map(|s| (s.id.clone(), s)).collect();
        let routes: HashMap<_, _> = self.routes.into_iter().map(|r| (r.id.clone(), r)).collect();

        let mut pending = self.trips;
        pending.sort_by(|a, b| a.id.cmp(&b.id));

        let mut trips: HashMap<FeedScopedId, Arc<StaticTrip>> = HashMap::new();
        let mut patterns_by_key: HashMap<(FeedScopedId, Vec<FeedScopedId>), Arc<StopPattern>> =
            HashMap::new();
        let mut patterns_per_route: HashMap<FeedScopedId, usize> = HashMap::new();
        let mut trips_by_route: HashMap<FeedScopedId, Vec<FeedScopedId>> = HashMap::new();
        let mut trips_by_stop: HashMap<FeedScopedId, Vec<FeedScopedId>> = HashMap::new();

        for trip in pending {
            if trips.contains_key(&trip.id) {
                return Err(ScheduleError::DuplicateTrip(trip.id));
            }
            if !routes.contains_key(&trip.route_id) {
                return Err(ScheduleError::UnknownRoute {
                    trip: trip.id,
                    route: trip.route_id,
                });
            }
            if !self.services.contains_key(&trip.service_id) {
                return Err(ScheduleError::UnknownService {
                    trip: trip.id,
                    service: trip.service_id,
                });
            }
            if trip.stop_times.len() < 2 {
                return Err(ScheduleError::TooFewStops(trip.id));
            }
            if let Some(st) = trip.stop_times.iter().find(|st| !stops.contains_key(&st.stop)) {
                return Err(ScheduleError::UnknownStop {
                    trip: trip.id,
                    stop: st.stop.clone(),
                });
            }
            if let Err(violation) =
                validate_times(trip.stop_times.iter().map(|st| (st.arrival, st.departure)))
            {
                return Err(ScheduleError::InvalidStopTimes {
                    trip: trip.id,
                    violation,
                });
            }

            let sequence: Vec<FeedScopedId> = trip.stop_times.iter().map(|st| st.stop.clone()).collect();
            let pattern_key = (trip.route_id.clone(), sequence.clone());
            let pattern = match patterns_by_key.get(&pattern_key) {
                Some(p) => Arc::clone(p),
                None => {
                    let n = patterns_per_route.entry(trip.route_id.clone()).or_default();
                    let id = trip.route_id.with_suffix(&format!(":{n}"));
                    *n += 1;
                    let p = Arc::new(StopPattern::new(id, sequence.clone()));
                    patterns_by_key.insert(pattern_key, Arc::clone(&p));
                    p
                }
            };

            trips_by_route
                .entry(trip.route_id.clone())
                .or_default()
                .push(trip.id.clone());
            for stop in sequence.iter().collect::<BTreeSet<_>>() {
                trips_by_stop.entry(stop.clone()).or_default().push(trip.id.clone());
            }

            trips.insert(
                trip.id.clone(),
                Arc::new(StaticTrip {
                    id: trip.id,
                    route_id: trip.route_id,
                    service_id: trip.service_id,
                    pattern_id: pattern.id.clone(),
                    stop_times: trip.stop_times,
                }),
            );
        }

        let mut dated_journeys = HashMap::new();
        for (id, journey) in self.dated_journeys {
            if !trips.contains_key(&journey.trip_id) {
                return Err(ScheduleError::UnknownDatedTrip {
                    journey: id,
                    trip: journey.trip_id,
                });
            }
            dated_journeys.insert(id, journey);
        }

        let mut stations: HashMap<FeedScopedId, Vec<FeedScopedId>> = HashMap::new();
        for stop in stops.values() {
            if let Some(station) = &stop.station {
                stations.entry(station.clone()).or_default().push(stop.id.clone());
            }
        }

        let patterns: HashMap<_, _> = patterns_by_key
            .into_values()
            .map(|p| (p.id.clone(), p))
            .collect();

        debug!(
            stops = stops.len(),
            routes = routes.len(),
            trips = trips.len(),
            patterns = patterns.len(),
            "Built schedule index"
        );

        Ok(ScheduleIndex {
            stops,
            stations,
            routes,
            services: self.services,
            trips,
            patterns,
            dated_journeys,
            trips_by_route,
            trips_by_stop,
        })
    }
}

/// Immutable lookups over the static schedule.
#[derive(Debug)]
pub struct ScheduleIndex {
    stops: HashMap<FeedScopedId, Stop>,
    /// Station id -> its stops
    stations: HashMap<FeedScopedId, Vec<FeedScopedId>>,
    routes: HashMap<FeedScopedId, Route>,
    services: HashMap<FeedScopedId, BTreeSet<NaiveDate>>,
    trips: HashMap<FeedScopedId, Arc<StaticTrip>>,
    patterns: HashMap<FeedScopedId, Arc<StopPattern>>,
    dated_journeys: HashMap<FeedScopedId, DatedJourney>,
    /// Trip ids per route, sorted
    trips_by_route: HashMap<FeedScopedId, Vec<FeedScopedId>>,
    /// Trip ids calling at each stop, sorted
    trips_by_stop: HashMap<FeedScopedId, Vec<FeedScopedId>>,
}

impl ScheduleIndex {
    pub fn stop(&self, id: &FeedScopedId) -> Option<&Stop> {
        self.stops.get(id)
    }

    pub fn route(&self, id: &FeedScopedId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn trip(&self, id: &FeedScopedId) -> Option<&Arc<StaticTrip>> {
        self.trips.get(id)
    }

    pub fn pattern(&self, id: &FeedScopedId) -> Option<&Arc<StopPattern>> {
        self.patterns.get(id)
    }

    /// Returns every static trip.
    pub fn trips(&self) -> impl Iterator<Item = &Arc<StaticTrip>> {
        self.trips.values()
    }

    /// Returns every static pattern.
    pub fn patterns(&self) -> impl Iterator<Item = &Arc<StopPattern>> {
        self.patterns.values()
    }

    /// Returns the trip and service date of a dated vehicle journey.
    pub fn dated_journey(&self, id: &FeedScopedId) -> Option<(&FeedScopedId, NaiveDate)> {
        self.dated_journeys
            .get(id)
            .map(|j| (&j.trip_id, j.service_date))
    }

    /// Returns true if the trip exists and its service runs on the date.
    pub fn runs_on(&self, trip_id: &FeedScopedId, date: NaiveDate) -> bool {
        self.trips
            .get(trip_id)
            .and_then(|t| self.services.get(&t.service_id))
            .is_some_and(|dates| dates.contains(&date))
    }

    /// Returns the dates on which a service runs.
    pub fn service_dates(&self, service_id: &FeedScopedId) -> Option<&BTreeSet<NaiveDate>> {
        self.services.get(service_id)
    }

    /// Returns ids of the trips on a route, sorted.
    pub fn trips_on_route(&self, route_id: &FeedScopedId) -> &[FeedScopedId] {
        self.trips_by_route
            .get(route_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns ids of the trips calling at a stop, sorted.
    pub fn trips_at_stop(&self, stop_id: &FeedScopedId) -> &[FeedScopedId] {
        self.trips_by_stop
            .get(stop_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the stop and its siblings.
    pub fn stop_and_siblings(&self, stop_id: &FeedScopedId) -> Vec<FeedScopedId> {
        match self
            .stops
            .get(stop_id)
            .and_then(|s| s.station.as_ref())
            .and_then(|station| self.stations.get(station))
        {
            Some(members) => {
                let mut all = members.clone();
                all.sort();
                all
            }
            None => vec![stop_id.clone()],
        }
    }

    /// Returns true if two stops are siblings under one parent station.
    pub fn is_sibling(&self, a: &FeedScopedId, b: &FeedScopedId) -> bool {
        match (self.stops.get(a), self.stops.get(b)) {
            (Some(a), Some(b)) => a.is_sibling_of(b),
            _ => false,
        }
    }

    /// Returns true if `candidate` is `scheduled` or one of its siblings.
    pub fn stop_matches(&self, scheduled: &FeedScopedId, candidate: &FeedScopedId) -> bool {
        scheduled == candidate || self.is_sibling(scheduled, candidate)
    }

    /// Builds the scheduled row for a trip run, if the trip runs that day.
    pub fn scheduled_row(&self, key: &TripKey) -> Option<RealizedTimetableRow> {
        if !self.runs_on(&key.trip_id, key.service_date) {
            return None;
        }
        let trip = self.trips.get(&key.trip_id)?;
        let pattern = self.patterns.get(&trip.pattern_id)?;
        Some(RealizedTimetableRow::from_trip(
            key.clone(),
            trip,
            Arc::clone(pattern),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServiceTime;

    fn id(s: &str) -> FeedScopedId {
        FeedScopedId::new("F", s).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn st(stop: &str, arr: i32, dep: i32) -> ScheduledStopTime {
        ScheduledStopTime::new(id(stop), ServiceTime::from_seconds(arr), ServiceTime::from_seconds(dep))
    }

    fn base() -> ScheduleIndexBuilder {
        ScheduleIndexBuilder::new()
            .stop(Stop::new(id("A1"), "A1").with_station(id("A")))
            .stop(Stop::new(id("B1"), "B1").with_station(id("B")))
            .stop(Stop::new(id("B2"), "B2").with_station(id("B")))
            .stop(Stop::new(id("C1"), "C1"))
            .route(Route::new(id("R1"), "Line 1"))
            .service(id("S1"), [date(7), date(8), date(9)])
    }

    #[test]
    fn trips_with_same_stops_share_a_pattern() {
        let index = base()
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .trip(id("T2"), id("R1"), id("S1"), vec![st("A1", 60, 61), st("B1", 70, 71)])
            .trip(id("T3"), id("R1"), id("S1"), vec![st("A1", 60, 61), st("C1", 80, 81)])
            .build()
            .unwrap();

        let p1 = &index.trip(&id("T1")).unwrap().pattern_id;
        let p2 = &index.trip(&id("T2")).unwrap().pattern_id;
        let p3 = &index.trip(&id("T3")).unwrap().pattern_id;
        assert_eq!(p1, p2);
        assert_ne!(p1, p3);
        assert_eq!(index.patterns().count(), 2);
        assert_eq!(p1.id(), "R1:0");
    }

    #[test]
    fn patterns_are_scoped_to_their_route() {
        let index = base()
            .route(Route::new(id("R2"), "Line 2"))
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .trip(id("T2"), id("R2"), id("S1"), vec![st("A1", 60, 61), st("B1", 70, 71)])
            .build()
            .unwrap();

        assert_eq!(index.trip(&id("T1")).unwrap().pattern_id.id(), "R1:0");
        assert_eq!(index.trip(&id("T2")).unwrap().pattern_id.id(), "R2:0");
        assert_eq!(index.patterns().count(), 2);
        assert_eq!(index.trips().count(), 2);
    }

    #[test]
    fn lookups_by_route_and_stop() {
        let index = base()
            .trip(id("T2"), id("R1"), id("S1"), vec![st("A1", 60, 61), st("C1", 80, 81)])
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .build()
            .unwrap();

        assert_eq!(index.trips_on_route(&id("R1")), &[id("T1"), id("T2")]);
        assert_eq!(index.trips_at_stop(&id("A1")), &[id("T1"), id("T2")]);
        assert_eq!(index.trips_at_stop(&id("C1")), &[id("T2")]);
        assert!(index.trips_at_stop(&id("B2")).is_empty());
        assert!(index.trips_on_route(&id("R9")).is_empty());
    }

    #[test]
    fn service_calendar() {
        let index = base()
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .build()
            .unwrap();
        assert!(index.runs_on(&id("T1"), date(8)));
        assert!(!index.runs_on(&id("T1"), date(10)));
        assert!(!index.runs_on(&id("nope"), date(8)));
        assert_eq!(index.service_dates(&id("S1")).unwrap().len(), 3);
    }

    #[test]
    fn siblings() {
        let index = base().build().unwrap();
        assert!(index.is_sibling(&id("B1"), &id("B2")));
        assert!(!index.is_sibling(&id("B1"), &id("B1")));
        assert!(!index.is_sibling(&id("A1"), &id("B1")));
        assert!(index.stop_matches(&id("B1"), &id("B1")));
        assert!(index.stop_matches(&id("B1"), &id("B2")));
        assert_eq!(index.stop_and_siblings(&id("B2")), vec![id("B1"), id("B2")]);
        assert_eq!(index.stop_and_siblings(&id("C1")), vec![id("C1")]);
    }

    #[test]
    fn dated_journeys() {
        let index = base()
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .dated_journey(id("T1"), id("T1"), date(8))
            .build()
            .unwrap();
        assert_eq!(index.dated_journey(&id("T1")), Some((&id("T1"), date(8))));
        assert_eq!(index.dated_journey(&id("T2")), None);
    }

    #[test]
    fn scheduled_row_only_on_service_days() {
        let index = base()
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .build()
            .unwrap();
        let row = index.scheduled_row(&TripKey::new(id("T1"), date(8))).unwrap();
        assert_eq!(row.to_string(), "SCHEDULED | A1 0:00:10 0:00:11 | B1 0:00:20 0:00:21");
        assert!(index.scheduled_row(&TripKey::new(id("T1"), date(1))).is_none());
    }

    #[test]
    fn rejects_dangling_references() {
        let err = base()
            .trip(id("T1"), id("R9"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .build()
            .unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownRoute { .. }));

        let err = base()
            .trip(id("T1"), id("R1"), id("S9"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .build()
            .unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownService { .. }));

        let err = base()
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("Z9", 20, 21)])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ScheduleError::UnknownStop {
                trip: id("T1"),
                stop: id("Z9")
            }
        );

        let err = base()
            .dated_journey(id("DJ"), id("T1"), date(8))
            .build()
            .unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownDatedTrip { .. }));
    }

    #[test]
    fn rejects_malformed_trips() {
        let err = base()
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11)])
            .build()
            .unwrap_err();
        assert_eq!(err, ScheduleError::TooFewStops(id("T1")));

        let err = base()
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 5, 21)])
            .build()
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidStopTimes { .. }));

        let err = base()
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .trip(id("T1"), id("R1"), id("S1"), vec![st("A1", 10, 11), st("B1", 20, 21)])
            .build()
            .unwrap_err();
        assert_eq!(err, ScheduleError::DuplicateTrip(id("T1")));
    }
}
