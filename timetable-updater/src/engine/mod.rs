//! Per-feed orchestration of realtime updates.
//!
//! An [`UpdateEngine`] owns one feed's staging buffer and is its only
//! writer. For every journey update in a batch it resolves the trip run,
//! produces a new row, validates it and stages it; failures are classified
//! and collected without aborting the batch. At the end of a batch the
//! engine decides whether to publish a new snapshot version.
//!
//! # Update flow
//!
//! 1. Updates for unmonitored journeys are rejected before anything else.
//! 2. The journey is resolved by reference. Extra journeys that resolve to
//!    nothing become added trips; other unresolved journeys go to fuzzy
//!    matching when the batch allows it.
//! 3. A cancellation replaces the run's row with a cancelled copy. Later
//!    updates to that run in the same batch are skipped with a warning.
//! 4. Otherwise call updates are applied to the run's latest row: staged,
//!    else published, else scheduled.

mod config;
mod result;

pub use config::UpdaterConfig;
pub use result::{
    BatchResult, UpdateError, UpdateErrorKind, UpdateOutcome, UpdateSuccess, WarningType,
};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use crate::domain::{FeedScopedId, RealizedTimetableRow, TripKey};
use crate::feed::{JourneyUpdate, UpdateBatch};
use crate::resolve::{FuzzyMatcher, Resolution, TripResolver};
use crate::schedule::ScheduleIndex;
use crate::snapshot::{SnapshotBuffer, SnapshotPublisher, SnapshotVersion};
use crate::timetable::{PatternSynthesizer, TimetableMutator};

/// Applies realtime update batches of one feed.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chrono::NaiveDate;
/// use timetable_updater::domain::{FeedScopedId, Route, ScheduledStopTime, ServiceTime, Stop};
/// use timetable_updater::engine::{UpdateEngine, UpdaterConfig};
/// use timetable_updater::feed::{JourneyUpdate, UpdateBatch};
/// use timetable_updater::schedule::ScheduleIndexBuilder;
/// use timetable_updater::snapshot::SnapshotPublisher;
///
/// let id = |s: &str| FeedScopedId::new("F", s).unwrap();
/// let t = ServiceTime::from_seconds;
/// let date = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
/// let schedule = ScheduleIndexBuilder::new()
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
/// let publisher = Arc::new(SnapshotPublisher::new());
/// let mut engine = UpdateEngine::new("F", Arc::new(schedule), Arc::clone(&publisher), UpdaterConfig::default());
///
/// let cancel = JourneyUpdate { cancellation: true, ..JourneyUpdate::default() }.framed(date, "T1");
/// let result = engine.apply_batch(UpdateBatch::new("F", vec![cancel]).with_fast_path());
///
/// assert_eq!(result.successful, 1);
/// assert_eq!(result.published_version, Some(1));
/// ```
#[derive(Debug)]
pub struct UpdateEngine {
    feed_id: String,
    schedule: Arc<ScheduleIndex>,
    publisher: Arc<SnapshotPublisher>,
    buffer: SnapshotBuffer,
    patterns: PatternSynthesizer,
    config: UpdaterConfig,
    last_publish: Instant,
}

impl UpdateEngine {
    pub fn new(
        feed_id: impl Into<String>,
        schedule: Arc<ScheduleIndex>,
        publisher: Arc<SnapshotPublisher>,
        config: UpdaterConfig,
    ) -> Self {
        let feed_id = feed_id.into();
        let patterns = PatternSynthesizer::new(&feed_id, &schedule);
        Self {
            buffer: SnapshotBuffer::new(feed_id.as_str()),
            feed_id,
            schedule,
            publisher,
            patterns,
            config,
            last_publish: Instant::now(),
        }
    }

    /// Returns the feed this engine updates.
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Returns the latest published snapshot.
    pub fn snapshot(&self) -> Arc<SnapshotVersion> {
        self.publisher.current()
    }

    /// Returns the published rows a route search should see, honouring
    /// the planned-cancellations setting.
    pub fn search_rows(&self) -> Vec<Arc<RealizedTimetableRow>> {
        self.snapshot()
            .rows_for_search(self.config.include_planned_cancellations)
            .cloned()
            .collect()
    }

    /// Returns true if staged changes await publication.
    pub fn has_pending_changes(&self) -> bool {
        self.buffer.is_dirty()
    }

    /// Applies a batch, publishing according to the publish policy.
    pub fn apply_batch(&mut self, batch: UpdateBatch) -> BatchResult {
        self.apply_batch_at(batch, Instant::now())
    }

    /// Applies a batch as if at `now`.
    pub fn apply_batch_at(&mut self, batch: UpdateBatch, now: Instant) -> BatchResult {
        if batch.feed_id != self.feed_id {
            warn!(
                feed = %self.feed_id,
                batch_feed = %batch.feed_id,
                "Batch addressed to another feed; applying to this feed"
            );
        }
        if batch.full_dataset {
            debug!(feed = %self.feed_id, "Full dataset, clearing previous realtime data");
            self.buffer.clear_feed();
        }
        if self.config.purge_expired_data {
            if let Some(cutoff) = batch
                .reference_date
                .and_then(|d| d.checked_sub_days(Days::new(1)))
            {
                self.purge_expired(cutoff);
            }
        }

        let mut result = BatchResult::default();
        let mut cancelled = HashSet::new();
        for update in &batch.updates {
            let outcome = self.apply_update(update, batch.fuzzy_matching, &mut cancelled);
            if let Err(error) = &outcome {
                debug!(
                    feed = %self.feed_id,
                    kind = %error.kind,
                    trip = ?error.trip_key,
                    "Journey update rejected"
                );
            }
            result.record(outcome);
        }

        let due = now.saturating_duration_since(self.last_publish) >= self.config.max_publish_delay();
        if (batch.fast_path || due) && self.buffer.is_dirty() {
            result.published_version = Some(self.publish_at(now));
        }

        info!(
            feed = %self.feed_id,
            successful = result.successful,
            failed = result.failed,
            published = ?result.published_version,
            "Applied update batch"
        );
        result
    }

    /// Publishes staged changes if the maximum publish delay has passed.
    pub fn flush_if_due(&mut self, now: Instant) -> Option<u64> {
        let due = now.saturating_duration_since(self.last_publish) >= self.config.max_publish_delay();
        (due && self.buffer.is_dirty()).then(|| self.publish_at(now))
    }

    /// Publishes staged changes now, if there are any.
    pub fn force_publish(&mut self) -> Option<u64> {
        self.buffer
            .is_dirty()
            .then(|| self.publish_at(Instant::now()))
    }

    /// Drops realtime data dated before `cutoff`. Published rows are only
    /// marked for removal when there are any, so an idle purge publishes
    /// nothing.
    fn purge_expired(&mut self, cutoff: NaiveDate) {
        let published = !self.buffer.is_cleared()
            && self.snapshot().has_rows_before(&self.feed_id, cutoff);
        if published {
            debug!(feed = %self.feed_id, %cutoff, "Purging expired realtime rows");
            self.buffer.purge_expired(cutoff);
        } else {
            self.buffer.drop_expired(cutoff);
        }
    }

    fn publish_at(&mut self, now: Instant) -> u64 {
        let version = self.publisher.publish(&mut self.buffer);
        self.last_publish = now;
        version.version()
    }

    fn apply_update(
        &mut self,
        update: &JourneyUpdate,
        fuzzy_matching: bool,
        cancelled: &mut HashSet<TripKey>,
    ) -> UpdateOutcome {
        if update.is_unmonitored() {
            return Err(UpdateError::new(UpdateErrorKind::NotMonitored));
        }

        let resolution = TripResolver::new(&self.feed_id, &self.schedule).resolve(update);
        let key = match resolution {
            Resolution::Found(key) => key,
            Resolution::NotFound if update.extra_journey => {
                return self.add_journey(update, cancelled);
            }
            Resolution::NotFound if fuzzy_matching => {
                let route = self.scoped(update.line_ref.as_deref());
                let date = service_date_of(update);
                FuzzyMatcher::new(&self.feed_id, &self.schedule, self.config.fuzzy_tolerance())
                    .resolve(&update.calls, route.as_ref(), date)
                    .ok_or(UpdateError::new(UpdateErrorKind::NoFuzzyTripMatch))?
            }
            Resolution::NotFound => return Err(UpdateError::new(UpdateErrorKind::TripNotFound)),
        };

        let success = UpdateSuccess::new(update.producer_ref.clone());
        if cancelled.contains(&key) {
            debug!(trip = %key, "Ignoring update to a trip cancelled earlier in the batch");
            return Ok(success.with_warning(WarningType::TripCancelledEarlierInBatch));
        }

        let Some(base) = self.current_row(&key) else {
            return Err(UpdateError::for_trip(UpdateErrorKind::TripNotFound, key));
        };

        if update.cancellation {
            self.buffer.stage(base.cancelled());
            cancelled.insert(key);
            return Ok(success);
        }

        let Some(trip) = self.schedule.trip(&key.trip_id) else {
            return Err(UpdateError::for_trip(UpdateErrorKind::TripNotFound, key));
        };
        let row = TimetableMutator::new(&self.feed_id, &self.schedule)
            .update_times(&base, trip, &update.calls, &mut self.patterns)
            .map_err(|e| UpdateError::for_trip(UpdateErrorKind::from(&e), key))?;
        self.buffer.stage(row);
        Ok(success)
    }

    /// Applies an extra journey that resolved to no scheduled trip.
    fn add_journey(
        &mut self,
        update: &JourneyUpdate,
        cancelled: &mut HashSet<TripKey>,
    ) -> UpdateOutcome {
        let unknown = || UpdateError::new(UpdateErrorKind::Unknown);

        let Some(trip_id) = self.scoped(update.estimated_vehicle_journey_code.as_deref()) else {
            debug!("Extra journey without journey code");
            return Err(unknown());
        };
        if self.schedule.trip(&trip_id).is_some() {
            debug!(trip = %trip_id, "Extra journey code collides with a scheduled trip");
            return Err(unknown());
        }
        let Some(date) = service_date_of(update) else {
            debug!(trip = %trip_id, "Extra journey without service date");
            return Err(unknown());
        };
        let key = TripKey::new(trip_id, date);
        let Some(route_id) = self.route_for_added(update) else {
            debug!(trip = %key, "Extra journey without a known route");
            return Err(UpdateError::for_trip(UpdateErrorKind::Unknown, key));
        };

        let mut success = UpdateSuccess::new(update.producer_ref.clone());
        if cancelled.contains(&key) {
            return Ok(success.with_warning(WarningType::TripCancelledEarlierInBatch));
        }

        let added = TimetableMutator::new(&self.feed_id, &self.schedule)
            .add_journey(key.clone(), &route_id, &update.calls, &mut self.patterns)
            .map_err(|e| UpdateError::for_trip(UpdateErrorKind::from(&e), key.clone()))?;
        if added.removed_unknown_stops {
            success = success.with_warning(WarningType::UnknownStopsRemovedFromAddedTrip);
        }

        let row = if update.cancellation {
            cancelled.insert(key);
            added.row.cancelled()
        } else {
            added.row
        };
        debug!(trip = %row.key, state = %row.state, "Staging added journey");
        self.buffer.stage_new_trip(added.trip, row);
        Ok(success)
    }

    /// Returns the latest row of a run: staged, published, then scheduled.
    fn current_row(&self, key: &TripKey) -> Option<RealizedTimetableRow> {
        if let Some(row) = self.buffer.get(key) {
            return Some(RealizedTimetableRow::clone(row));
        }
        if !self.buffer.is_cleared() {
            if let Some(row) = self.publisher.current().row_for(key) {
                return Some(RealizedTimetableRow::clone(row));
            }
        }
        self.schedule.scheduled_row(key)
    }

    /// Picks the route of an added journey: its line, else the route of
    /// the journey it replaces.
    fn route_for_added(&self, update: &JourneyUpdate) -> Option<FeedScopedId> {
        let by_line = self
            .scoped(update.line_ref.as_deref())
            .filter(|id| self.schedule.route(id).is_some());
        by_line.or_else(|| {
            let replaced = self.scoped(update.vehicle_journey_ref.as_deref())?;
            self.schedule.trip(&replaced).map(|t| t.route_id.clone())
        })
    }

    /// Scopes a local reference to this engine's feed.
    fn scoped(&self, local: Option<&str>) -> Option<FeedScopedId> {
        FeedScopedId::new(self.feed_id.as_str(), local?).ok()
    }
}

/// Returns the explicit service date of an update, else its frame's date.
fn service_date_of(update: &JourneyUpdate) -> Option<NaiveDate> {
    update.service_date.or_else(|| {
        update
            .framed_vehicle_journey_ref
            .as_ref()
            .map(|f| f.service_date)
    })
}
