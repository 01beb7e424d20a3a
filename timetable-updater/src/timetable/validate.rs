//! Temporal validation of realized times.
//!
//! A row is valid when every call departs no earlier than it arrives
//! (non-negative dwell) and arrives no earlier than the previous call
//! departed (non-negative hop). Validation is a single forward scan that
//! reports the first violation; at each index the dwell check runs before
//! the hop check.

use crate::domain::{Call, CallIndex, ServiceTime};

/// The first temporal violation found in a sequence of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimeViolation {
    /// The call at `index` departs before it arrives.
    #[error("negative dwell time at call {index}")]
    NegativeDwellTime { index: CallIndex },
    /// The call at `index` arrives before the previous call departs.
    #[error("negative hop time at call {index}")]
    NegativeHopTime { index: CallIndex },
}

impl TimeViolation {
    /// Returns the index of the offending call.
    pub fn index(&self) -> CallIndex {
        match self {
            TimeViolation::NegativeDwellTime { index } | TimeViolation::NegativeHopTime { index } => {
                *index
            }
        }
    }
}

/// Validates realized times of a row's calls.
///
/// Cancelled calls take part in validation: their synthesized times must
/// be consistent too.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::{Call, CallIndex, FeedScopedId, ServiceTime};
/// use timetable_updater::timetable::{TimeViolation, validate};
///
/// let t = ServiceTime::from_seconds;
/// let a1 = FeedScopedId::new("F", "A1").unwrap();
/// let b1 = FeedScopedId::new("F", "B1").unwrap();
///
/// let mut calls = vec![Call::scheduled(a1, t(10), t(11)), Call::scheduled(b1, t(20), t(21))];
/// assert_eq!(validate(&calls), Ok(()));
///
/// calls[1].arrival = t(5);
/// calls[1].departure = t(5);
/// assert_eq!(validate(&calls), Err(TimeViolation::NegativeHopTime { index: CallIndex(1) }));
/// ```
pub fn validate(calls: &[Call]) -> Result<(), TimeViolation> {
    validate_times(calls.iter().map(|c| (c.arrival, c.departure)))
}

/// Validates a sequence of `(arrival, departure)` pairs.
///
/// Used directly for scheduled stop times, which have no `Call` form.
pub fn validate_times(
    times: impl IntoIterator<Item = (ServiceTime, ServiceTime)>,
) -> Result<(), TimeViolation> {
    let mut previous_departure: Option<ServiceTime> = None;
    for (i, (arrival, departure)) in times.into_iter().enumerate() {
        let index = CallIndex(i);
        if departure < arrival {
            return Err(TimeViolation::NegativeDwellTime { index });
        }
        if matches!(previous_departure, Some(prev) if arrival < prev) {
            return Err(TimeViolation::NegativeHopTime { index });
        }
        previous_departure = Some(departure);
    }
    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Non-decreasing times never fail validation
        #[test]
        fn monotone_times_are_valid(mut secs in prop::collection::vec(0i32..100_000, 0..20)) {
            secs.sort();
            let pairs: Vec<_> = secs
                .chunks(2)
                .map(|c| (ServiceTime::from_seconds(c[0]), ServiceTime::from_seconds(*c.last().unwrap_or(&c[0]))))
                .collect();
            prop_assert_eq!(validate_times(pairs), Ok(()));
        }

        /// A reported violation points at a pair that really violates
        #[test]
        fn violation_index_is_accurate(raw in prop::collection::vec((0i32..1000, 0i32..1000), 1..20)) {
            let pairs: Vec<_> = raw
                .iter()
                .map(|(a, d)| (ServiceTime::from_seconds(*a), ServiceTime::from_seconds(*d)))
                .collect();
            match validate_times(pairs.clone()) {
                Ok(()) => {
                    for (i, (a, d)) in pairs.iter().enumerate() {
                        prop_assert!(a <= d);
                        if i > 0 {
                            prop_assert!(pairs[i - 1].1 <= *a);
                        }
                    }
                }
                Err(TimeViolation::NegativeDwellTime { index }) => {
                    let (a, d) = pairs[index.0];
                    prop_assert!(d < a);
                }
                Err(TimeViolation::NegativeHopTime { index }) => {
                    prop_assert!(index.0 > 0);
                    prop_assert!(pairs[index.0].0 < pairs[index.0 - 1].1);
                }
            }
        }
    }
}
