//! Structured realtime update records.
//!
//! These are the already-parsed form of an estimated-timetable delivery: a
//! batch of journey updates for one feed, each carrying the references that
//! identify the journey and an ordered list of call updates. Wire-format
//! parsing happens upstream; the records derive `Deserialize` so an adapter
//! can hand them over as JSON or any other serde format.
//!
//! References (`stop_ref`, `dated_vehicle_journey_ref` and so on) are local
//! ids; they are scoped to the batch's feed when resolved.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::ServiceTime;

/// One delivery of journey updates from a single feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBatch {
    pub feed_id: String,
    /// Allow fuzzy matching of journeys without usable references.
    pub fuzzy_matching: bool,
    /// Publish immediately after applying this batch.
    pub fast_path: bool,
    /// The batch replaces all previous realtime data of the feed.
    pub full_dataset: bool,
    /// Date the batch was produced; drives expiry of old realtime data.
    pub reference_date: Option<NaiveDate>,
    pub updates: Vec<JourneyUpdate>,
}

impl UpdateBatch {
    /// Creates an incremental batch.
    pub fn new(feed_id: impl Into<String>, updates: Vec<JourneyUpdate>) -> Self {
        Self {
            feed_id: feed_id.into(),
            updates,
            ..Self::default()
        }
    }

    /// Enables fuzzy matching.
    pub fn with_fuzzy_matching(mut self) -> Self {
        self.fuzzy_matching = true;
        self
    }

    /// Requests immediate publication.
    pub fn with_fast_path(mut self) -> Self {
        self.fast_path = true;
        self
    }

    /// Marks the batch as a full dataset.
    pub fn with_full_dataset(mut self) -> Self {
        self.full_dataset = true;
        self
    }

    /// Sets the reference date.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }
}

/// A framed vehicle journey reference: a trip id within a dated data frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FramedJourneyRef {
    pub service_date: NaiveDate,
    pub vehicle_journey_ref: String,
}

/// Realtime information about one vehicle journey.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JourneyUpdate {
    pub dated_vehicle_journey_ref: Option<String>,
    pub framed_vehicle_journey_ref: Option<FramedJourneyRef>,
    /// Id for a journey introduced by the feed
    pub estimated_vehicle_journey_code: Option<String>,
    /// Scheduled journey an extra journey replaces
    pub vehicle_journey_ref: Option<String>,
    pub line_ref: Option<String>,
    pub operator_ref: Option<String>,
    pub producer_ref: Option<String>,
    /// `Some(false)` means the producer is not tracking this journey.
    pub monitored: Option<bool>,
    pub cancellation: bool,
    pub extra_journey: bool,
    /// Service date when no reference carries one
    pub service_date: Option<NaiveDate>,
    pub calls: Vec<CallUpdate>,
}

impl JourneyUpdate {
    /// Creates an update with the given calls and no references.
    pub fn with_calls(calls: Vec<CallUpdate>) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    /// Sets the dated vehicle journey reference.
    pub fn dated(mut self, reference: impl Into<String>) -> Self {
        self.dated_vehicle_journey_ref = Some(reference.into());
        self
    }

    /// Sets the framed vehicle journey reference.
    pub fn framed(mut self, service_date: NaiveDate, reference: impl Into<String>) -> Self {
        self.framed_vehicle_journey_ref = Some(FramedJourneyRef {
            service_date,
            vehicle_journey_ref: reference.into(),
        });
        self
    }

    /// Returns true if the producer reports it is not monitoring the journey.
    pub fn is_unmonitored(&self) -> bool {
        self.monitored == Some(false)
    }
}

/// Realtime information about one call of a journey.
///
/// Recorded calls carry actual times; estimated calls carry expected
/// times. Both may carry the aimed (planned) times for reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CallUpdate {
    pub stop_ref: String,
    pub aimed_arrival: Option<ServiceTime>,
    pub expected_arrival: Option<ServiceTime>,
    pub actual_arrival: Option<ServiceTime>,
    pub aimed_departure: Option<ServiceTime>,
    pub expected_departure: Option<ServiceTime>,
    pub actual_departure: Option<ServiceTime>,
    pub cancellation: bool,
    pub extra_call: bool,
    pub recorded: bool,
    pub prediction_inaccurate: bool,
    pub no_data: bool,
}

impl CallUpdate {
    /// Creates an update for a call at a stop.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_updater::domain::ServiceTime;
    /// use timetable_updater::feed::CallUpdate;
    ///
    /// let call = CallUpdate::at("A1")
    ///     .recorded()
    ///     .actual_departure(ServiceTime::from_seconds(15));
    ///
    /// assert_eq!(call.realized_departure(), Some(ServiceTime::from_seconds(15)));
    /// assert_eq!(call.realized_arrival(), None);
    /// ```
    pub fn at(stop_ref: impl Into<String>) -> Self {
        Self {
            stop_ref: stop_ref.into(),
            ..Self::default()
        }
    }

    pub fn aimed_arrival(mut self, t: ServiceTime) -> Self {
        self.aimed_arrival = Some(t);
        self
    }

    pub fn expected_arrival(mut self, t: ServiceTime) -> Self {
        self.expected_arrival = Some(t);
        self
    }

    pub fn actual_arrival(mut self, t: ServiceTime) -> Self {
        self.actual_arrival = Some(t);
        self
    }

    pub fn aimed_departure(mut self, t: ServiceTime) -> Self {
        self.aimed_departure = Some(t);
        self
    }

    pub fn expected_departure(mut self, t: ServiceTime) -> Self {
        self.expected_departure = Some(t);
        self
    }

    pub fn actual_departure(mut self, t: ServiceTime) -> Self {
        self.actual_departure = Some(t);
        self
    }

    /// Marks the call as recorded (already served).
    pub fn recorded(mut self) -> Self {
        self.recorded = true;
        self
    }

    /// Marks the stop as not served.
    pub fn cancelled(mut self) -> Self {
        self.cancellation = true;
        self
    }

    pub fn extra(mut self) -> Self {
        self.extra_call = true;
        self
    }

    pub fn prediction_inaccurate(mut self) -> Self {
        self.prediction_inaccurate = true;
        self
    }

    pub fn no_data(mut self) -> Self {
        self.no_data = true;
        self
    }

    /// Returns the actual arrival, else the expected one.
    pub fn realized_arrival(&self) -> Option<ServiceTime> {
        self.actual_arrival.or(self.expected_arrival)
    }

    /// Returns the actual departure, else the expected one.
    pub fn realized_departure(&self) -> Option<ServiceTime> {
        self.actual_departure.or(self.expected_departure)
    }
}
