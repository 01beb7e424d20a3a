//! Per-update outcomes and per-batch results.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::domain::TripKey;
use crate::timetable::{MutationError, TimeViolation};

/// Why a journey update was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateErrorKind {
    TripNotFound,
    NotMonitored,
    NoFuzzyTripMatch,
    NegativeHopTime,
    NegativeDwellTime,
    InvalidStopSequence,
    Unknown,
}

impl UpdateErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateErrorKind::TripNotFound => "TRIP_NOT_FOUND",
            UpdateErrorKind::NotMonitored => "NOT_MONITORED",
            UpdateErrorKind::NoFuzzyTripMatch => "NO_FUZZY_TRIP_MATCH",
            UpdateErrorKind::NegativeHopTime => "NEGATIVE_HOP_TIME",
            UpdateErrorKind::NegativeDwellTime => "NEGATIVE_DWELL_TIME",
            UpdateErrorKind::InvalidStopSequence => "INVALID_STOP_SEQUENCE",
            UpdateErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for UpdateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&MutationError> for UpdateErrorKind {
    fn from(value: &MutationError) -> Self {
        match value {
            MutationError::StopNotInPattern { .. } | MutationError::TooFewCalls(_) => {
                UpdateErrorKind::InvalidStopSequence
            }
            MutationError::MissingTimes { .. } => UpdateErrorKind::Unknown,
            MutationError::Time(TimeViolation::NegativeDwellTime { .. }) => {
                UpdateErrorKind::NegativeDwellTime
            }
            MutationError::Time(TimeViolation::NegativeHopTime { .. }) => {
                UpdateErrorKind::NegativeHopTime
            }
        }
    }
}

/// A rejected journey update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}", .trip_key.as_ref().map(|k| format!(" for {k}")).unwrap_or_default())]
pub struct UpdateError {
    pub kind: UpdateErrorKind,
    /// The run the update was about, when it could be resolved
    pub trip_key: Option<TripKey>,
}

impl UpdateError {
    /// An error for an update that could not be tied to a trip run.
    pub fn new(kind: UpdateErrorKind) -> Self {
        Self {
            kind,
            trip_key: None,
        }
    }

    /// An error for a resolved trip run.
    pub fn for_trip(kind: UpdateErrorKind, trip_key: TripKey) -> Self {
        Self {
            kind,
            trip_key: Some(trip_key),
        }
    }
}

/// Non-fatal conditions met while applying an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningType {
    /// Calls at stops unknown to the schedule were dropped from an added trip.
    UnknownStopsRemovedFromAddedTrip,
    /// The run was cancelled by an earlier update in the same batch.
    TripCancelledEarlierInBatch,
}

/// An applied journey update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSuccess {
    pub warnings: Vec<WarningType>,
    pub producer: Option<String>,
}

impl UpdateSuccess {
    pub fn new(producer: Option<String>) -> Self {
        Self {
            warnings: Vec::new(),
            producer,
        }
    }

    /// Adds a warning.
    pub fn with_warning(mut self, warning: WarningType) -> Self {
        self.warnings.push(warning);
        self
    }
}

/// The outcome of one journey update.
pub type UpdateOutcome = Result<UpdateSuccess, UpdateError>;

/// Aggregated outcomes of one batch.
///
/// Serializable so callers can log or expose it.
///
/// # Examples
///
/// ```
/// use timetable_updater::engine::{BatchResult, UpdateError, UpdateErrorKind, UpdateSuccess};
///
/// let mut result = BatchResult::default();
/// result.record(Ok(UpdateSuccess::default()));
/// result.record(Err(UpdateError::new(UpdateErrorKind::TripNotFound)));
///
/// assert_eq!(result.successful, 1);
/// assert_eq!(result.failed, 1);
/// // The kind is listed even though no trip was resolved
/// assert!(result.failures_of(UpdateErrorKind::TripNotFound).unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub successful: usize,
    pub failed: usize,
    pub failures: BTreeMap<UpdateErrorKind, BTreeSet<TripKey>>,
    pub warnings: Vec<WarningType>,
    /// Snapshot version published at the end of the batch, if any
    pub published_version: Option<u64>,
}

impl BatchResult {
    /// Adds one update's outcome.
    pub fn record(&mut self, outcome: UpdateOutcome) {
        match outcome {
            Ok(success) => {
                self.successful += 1;
                self.warnings.extend(success.warnings);
            }
            Err(error) => {
                self.failed += 1;
                let keys = self.failures.entry(error.kind).or_default();
                if let Some(key) = error.trip_key {
                    keys.insert(key);
                }
            }
        }
    }

    /// Returns the runs that failed with a kind, if the kind occurred.
    pub fn failures_of(&self, kind: UpdateErrorKind) -> Option<&BTreeSet<TripKey>> {
        self.failures.get(&kind)
    }

    /// Returns the total number of updates recorded.
    pub fn total(&self) -> usize {
        self.successful + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallIndex, FeedScopedId};
    use chrono::NaiveDate;

    fn key(trip: &str) -> TripKey {
        TripKey::new(
            FeedScopedId::new("F", trip).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
        )
    }

    #[test]
    fn error_display() {
        let err = UpdateError::for_trip(UpdateErrorKind::NegativeHopTime, key("T1"));
        assert_eq!(err.to_string(), "NEGATIVE_HOP_TIME for F:T1@2024-05-08");
        assert_eq!(UpdateError::new(UpdateErrorKind::Unknown).to_string(), "UNKNOWN");
    }

    #[test]
    fn mutation_errors_map_to_kinds() {
        let kind = |e: MutationError| UpdateErrorKind::from(&e);
        assert_eq!(
            kind(MutationError::StopNotInPattern { stop: "X".into() }),
            UpdateErrorKind::InvalidStopSequence
        );
        assert_eq!(kind(MutationError::TooFewCalls(1)), UpdateErrorKind::InvalidStopSequence);
        assert_eq!(
            kind(MutationError::MissingTimes { stop: "X".into() }),
            UpdateErrorKind::Unknown
        );
        assert_eq!(
            kind(TimeViolation::NegativeDwellTime { index: CallIndex(1) }.into()),
            UpdateErrorKind::NegativeDwellTime
        );
        assert_eq!(
            kind(TimeViolation::NegativeHopTime { index: CallIndex(1) }.into()),
            UpdateErrorKind::NegativeHopTime
        );
    }

    #[test]
    fn record_aggregates() {
        let mut result = BatchResult::default();
        result.record(Ok(UpdateSuccess::new(Some("RUT".into()))
            .with_warning(WarningType::TripCancelledEarlierInBatch)));
        result.record(Err(UpdateError::for_trip(UpdateErrorKind::TripNotFound, key("T2"))));
        result.record(Err(UpdateError::for_trip(UpdateErrorKind::TripNotFound, key("T1"))));
        result.record(Err(UpdateError::for_trip(UpdateErrorKind::TripNotFound, key("T1"))));

        assert_eq!(result.total(), 4);
        assert_eq!(result.failed, 3);
        let keys: Vec<_> = result
            .failures_of(UpdateErrorKind::TripNotFound)
            .unwrap()
            .iter()
            .cloned()
            .collect();
        assert_eq!(keys, vec![key("T1"), key("T2")]);
        assert_eq!(result.warnings, vec![WarningType::TripCancelledEarlierInBatch]);
        assert!(result.failures_of(UpdateErrorKind::NotMonitored).is_none());
    }

    #[test]
    fn serializes_for_logging() {
        let mut result = BatchResult::default();
        result.record(Err(UpdateError::new(UpdateErrorKind::NoFuzzyTripMatch)));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failed"], 1);
        assert!(json["failures"]["NO_FUZZY_TRIP_MATCH"].as_array().unwrap().is_empty());
        assert_eq!(json["published_version"], serde_json::Value::Null);
    }
}
