//! Fuzzy trip matching for updates without usable references.

use chrono::{Duration, NaiveDate};
use tracing::{debug, trace};

use crate::domain::{FeedScopedId, TripKey};
use crate::feed::CallUpdate;
use crate::schedule::ScheduleIndex;

/// Matches a journey to a scheduled trip by its first call.
///
/// The first call's aimed departure is compared with the scheduled
/// departure of every trip calling at that stop (or a sibling of it) on the
/// service date, optionally restricted to one route. The closest trip
/// within the tolerance wins; ties go to the lexically smallest trip id.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher<'a> {
    feed_id: &'a str,
    schedule: &'a ScheduleIndex,
    tolerance: Duration,
}

impl<'a> FuzzyMatcher<'a> {
    pub fn new(feed_id: &'a str, schedule: &'a ScheduleIndex, tolerance: Duration) -> Self {
        Self {
            feed_id,
            schedule,
            tolerance,
        }
    }

    /// Finds the best matching trip run, if any.
    ///
    /// Returns `None` without a service date, without calls, when the first
    /// call has no aimed departure, or when no candidate is within
    /// tolerance.
    pub fn resolve(
        &self,
        calls: &[CallUpdate],
        route: Option<&FeedScopedId>,
        service_date: Option<NaiveDate>,
    ) -> Option<TripKey> {
        let service_date = service_date?;
        let first = calls.first()?;
        let Some(aimed) = first.aimed_departure else {
            debug!(stop = %first.stop_ref, "First call has no aimed departure");
            return None;
        };
        let stop = FeedScopedId::new(self.feed_id, first.stop_ref.as_str()).ok()?;

        let mut best: Option<(i64, &FeedScopedId)> = None;
        for candidate_stop in self.schedule.stop_and_siblings(&stop) {
            for trip_id in self.schedule.trips_at_stop(&candidate_stop) {
                let Some(trip) = self.schedule.trip(trip_id) else {
                    continue;
                };
                if route.is_some_and(|r| *r != trip.route_id) {
                    continue;
                }
                if !self.schedule.runs_on(trip_id, service_date) {
                    continue;
                }
                for st in trip.stop_times.iter().filter(|st| st.stop == candidate_stop) {
                    let delta = st.departure.signed_duration_since(aimed).abs();
                    if delta > self.tolerance {
                        continue;
                    }
                    let delta = delta.num_seconds();
                    let better = match best {
                        None => true,
                        Some((best_delta, best_id)) => (delta, trip_id) < (best_delta, best_id),
                    };
                    if better {
                        trace!(trip = %trip_id, delta, "Fuzzy candidate");
                        best = Some((delta, trip_id));
                    }
                }
            }
        }

        best.map(|(_, trip_id)| TripKey::new(trip_id.clone(), service_date))
    }
}
