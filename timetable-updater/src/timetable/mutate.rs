//! Applying journey updates to realized timetable rows.
//!
//! # Call matching
//!
//! Each call update is matched to the earliest remaining position of the
//! scheduled pattern whose stop is the call's stop or a sibling of it.
//! A call at a stop that only occurs earlier in the pattern is ignored; a
//! call at a stop foreign to the pattern makes the whole update invalid.
//!
//! # Time filling
//!
//! Realized times are the actual times if present, else the expected ones.
//! A missing arrival at the first stop equals the departure and a missing
//! departure at the last stop equals the arrival. Elsewhere a missing side
//! is its scheduled time shifted by the delay of the supplied side.
//!
//! A call that is cancelled or marked no-data without any times takes its
//! scheduled times shifted by the departure delay of the previous call,
//! never earlier than that departure and never later than the next
//! explicitly supplied arrival. Times supplied by the feed are never
//! adjusted; inconsistencies among them are left for validation.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::{
    Call, CallFlags, FeedScopedId, RealTimeState, RealizedTimetableRow, ScheduledStopTime,
    ServiceTime, StateChange, StaticTrip, TripKey,
};
use crate::feed::CallUpdate;
use crate::schedule::ScheduleIndex;

use super::pattern::PatternSynthesizer;
use super::validate::{TimeViolation, validate};

/// Reasons a journey update cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// A call names a stop the trip's pattern does not contain.
    #[error("stop {stop} is not part of the trip's pattern")]
    StopNotInPattern { stop: String },

    /// Too few calls remain to form a journey.
    #[error("journey has {0} usable calls, at least two are required")]
    TooFewCalls(usize),

    /// An added journey's call carries no time at all.
    #[error("call at {stop} carries no times")]
    MissingTimes { stop: String },

    #[error(transparent)]
    Time(#[from] TimeViolation),
}

/// A journey introduced by a realtime feed.
#[derive(Debug, Clone)]
pub struct AddedJourney {
    pub trip: Arc<StaticTrip>,
    pub row: RealizedTimetableRow,
    /// Calls at stops unknown to the static schedule were dropped.
    pub removed_unknown_stops: bool,
}

/// Produces new rows from call updates. Never mutates its inputs.
#[derive(Debug, Clone, Copy)]
pub struct TimetableMutator<'a> {
    feed_id: &'a str,
    schedule: &'a ScheduleIndex,
}

impl<'a> TimetableMutator<'a> {
    pub fn new(feed_id: &'a str, schedule: &'a ScheduleIndex) -> Self {
        Self { feed_id, schedule }
    }

    /// Applies call updates to a scheduled trip's current row.
    ///
    /// `base` is the latest realized row of the run (staged, published or
    /// scheduled). A cancelled base is first reinstated from the schedule.
    pub fn update_times(
        &self,
        base: &RealizedTimetableRow,
        trip: &StaticTrip,
        updates: &[CallUpdate],
        patterns: &mut PatternSynthesizer,
    ) -> Result<RealizedTimetableRow, MutationError> {
        let n = trip.stop_times.len();
        let mut calls: Vec<Call> = if base.is_cancelled() || base.calls.len() != n {
            trip.stop_times
                .iter()
                .map(|st| Call::scheduled(st.stop.clone(), st.arrival, st.departure))
                .collect()
        } else {
            base.calls.clone()
        };

        let matched = self.match_calls(trip, updates)?;

        let mut explicit = vec![false; n];
        let mut synthesize = vec![false; n];
        for (j, stop, update) in matched {
            let call = &mut calls[j];
            call.stop = stop;
            call.flags = flags_of(update);

            let (arrival, departure) = match (update.realized_arrival(), update.realized_departure()) {
                (Some(a), Some(d)) => (a, d),
                (None, Some(d)) if j == 0 => (d, d),
                (None, Some(d)) => (shift(call.scheduled_arrival, d, call.scheduled_departure), d),
                (Some(a), None) if j == n - 1 => (a, a),
                (Some(a), None) => (a, shift(call.scheduled_departure, a, call.scheduled_arrival)),
                (None, None) => {
                    if update.cancellation || update.no_data {
                        synthesize[j] = true;
                    }
                    continue;
                }
            };
            call.arrival = arrival;
            call.departure = departure;
            explicit[j] = true;
        }

        for j in (0..n).filter(|&j| synthesize[j]) {
            let (delay, floor) = match j.checked_sub(1).map(|p| &calls[p]) {
                Some(prev) => (prev.departure_delay(), Some(prev.departure)),
                None => (0, None),
            };
            let ceiling = (j + 1..n).find(|&k| explicit[k]).map(|k| calls[k].arrival);

            let call = &mut calls[j];
            let mut arrival = call.scheduled_arrival.plus_seconds(delay);
            let mut departure = call.scheduled_departure.plus_seconds(delay);
            if let Some(floor) = floor {
                arrival = arrival.max(floor);
                departure = departure.max(arrival);
            }
            if let Some(ceiling) = ceiling {
                arrival = arrival.min(ceiling);
                departure = departure.min(ceiling);
            }
            trace!(stop = %call.stop, delay, "Synthesized times for call without data");
            call.arrival = arrival;
            call.departure = departure;
        }

        validate(&calls)?;

        let stops_changed = calls
            .iter()
            .zip(&trip.stop_times)
            .any(|(c, st)| c.stop != st.stop);
        let any_cancelled = calls.iter().any(Call::is_cancelled);

        let pattern = if stops_changed {
            let stops: Vec<FeedScopedId> = calls.iter().map(|c| c.stop.clone()).collect();
            patterns.synthesize(&trip.route_id, &stops).0
        } else {
            match self.schedule.pattern(&trip.pattern_id) {
                Some(p) => Arc::clone(p),
                None => Arc::clone(&base.pattern),
            }
        };

        let change = if stops_changed || any_cancelled {
            StateChange::ModifyStops
        } else {
            StateChange::UpdateTimes
        };

        Ok(RealizedTimetableRow {
            key: base.key.clone(),
            pattern,
            calls,
            state: base.state.apply(change),
        })
    }

    /// Builds the trip and row of a journey that is not in the schedule.
    ///
    /// Calls at unknown stops are dropped. The aimed times become the
    /// trip's scheduled times; realized times fall back to them.
    pub fn add_journey(
        &self,
        key: TripKey,
        route_id: &FeedScopedId,
        updates: &[CallUpdate],
        patterns: &mut PatternSynthesizer,
    ) -> Result<AddedJourney, MutationError> {
        let known: Vec<(FeedScopedId, &CallUpdate)> = updates
            .iter()
            .filter_map(|u| {
                let stop = FeedScopedId::new(self.feed_id, u.stop_ref.as_str()).ok()?;
                self.schedule.stop(&stop).map(|_| (stop, u))
            })
            .collect();
        let removed_unknown_stops = known.len() < updates.len();
        if removed_unknown_stops {
            debug!(
                trip = %key,
                removed = updates.len() - known.len(),
                "Removed unknown stops from added journey"
            );
        }
        if known.len() < 2 {
            return Err(MutationError::TooFewCalls(known.len()));
        }

        let mut stop_times = Vec::with_capacity(known.len());
        let mut calls = Vec::with_capacity(known.len());
        for (stop, update) in known {
            let realized = fill_pair(update.realized_arrival(), update.realized_departure());
            let aimed = fill_pair(update.aimed_arrival, update.aimed_departure);
            let Some((scheduled, realized)) = aimed.or(realized).zip(realized.or(aimed)) else {
                return Err(MutationError::MissingTimes {
                    stop: update.stop_ref.clone(),
                });
            };

            stop_times.push(ScheduledStopTime::new(stop.clone(), scheduled.0, scheduled.1));
            calls.push(Call {
                stop,
                scheduled_arrival: scheduled.0,
                scheduled_departure: scheduled.1,
                arrival: realized.0,
                departure: realized.1,
                flags: flags_of(update),
            });
        }

        validate(&calls)?;

        let stops: Vec<FeedScopedId> = calls.iter().map(|c| c.stop.clone()).collect();
        let (pattern, _) = patterns.synthesize(route_id, &stops);

        let trip = Arc::new(StaticTrip {
            id: key.trip_id.clone(),
            route_id: route_id.clone(),
            service_id: key.trip_id.clone(),
            pattern_id: pattern.id.clone(),
            stop_times,
        });
        let row = RealizedTimetableRow {
            key,
            pattern,
            calls,
            state: RealTimeState::Scheduled.apply(StateChange::AddJourney),
        };

        Ok(AddedJourney {
            trip,
            row,
            removed_unknown_stops,
        })
    }

    /// Matches call updates to pattern positions.
    fn match_calls<'u>(
        &self,
        trip: &StaticTrip,
        updates: &'u [CallUpdate],
    ) -> Result<Vec<(usize, FeedScopedId, &'u CallUpdate)>, MutationError> {
        let scheduled: Vec<&FeedScopedId> = trip.stops().collect();
        let mut cursor = 0;
        let mut matched = Vec::with_capacity(updates.len());

        for update in updates {
            let stop = FeedScopedId::new(self.feed_id, update.stop_ref.as_str()).map_err(|_| {
                MutationError::StopNotInPattern {
                    stop: update.stop_ref.clone(),
                }
            })?;
            let matches = |j: &usize| self.schedule.stop_matches(scheduled[*j], &stop);

            if let Some(j) = (cursor..scheduled.len()).find(matches) {
                matched.push((j, stop, update));
                cursor = j + 1;
            } else if (0..cursor).any(|j| matches(&j)) {
                trace!(stop = %stop, "Ignoring call at a stop already passed");
            } else {
                return Err(MutationError::StopNotInPattern {
                    stop: update.stop_ref.clone(),
                });
            }
        }
        Ok(matched)
    }
}

/// Returns `base` shifted by the delay `actual - reference`.
fn shift(base: ServiceTime, actual: ServiceTime, reference: ServiceTime) -> ServiceTime {
    base.plus_seconds(actual.seconds_since(reference))
}

/// Completes an arrival/departure pair from whichever side is present.
fn fill_pair(
    arrival: Option<ServiceTime>,
    departure: Option<ServiceTime>,
) -> Option<(ServiceTime, ServiceTime)> {
    match (arrival, departure) {
        (Some(a), Some(d)) => Some((a, d)),
        (Some(t), None) | (None, Some(t)) => Some((t, t)),
        (None, None) => None,
    }
}

fn flags_of(update: &CallUpdate) -> CallFlags {
    CallFlags {
        cancelled: update.cancellation,
        recorded: update.recorded,
        prediction_inaccurate: update.prediction_inaccurate,
        no_data: update.no_data,
        extra: update.extra_call,
    }
}
