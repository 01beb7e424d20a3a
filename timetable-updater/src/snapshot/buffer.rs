//! Per-feed staging of realtime changes between publishes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::trace;

use crate::domain::{FeedScopedId, RealizedTimetableRow, StaticTrip, TripKey};

/// Pending changes of one feed, owned by that feed's single writer.
///
/// Staging the same key twice keeps the last row. Nothing here is visible
/// to readers until the buffer is handed to
/// [`SnapshotPublisher::publish`](super::SnapshotPublisher::publish).
#[derive(Debug)]
pub struct SnapshotBuffer {
    feed_id: String,
    rows: HashMap<TripKey, Arc<RealizedTimetableRow>>,
    new_trips: HashMap<FeedScopedId, Arc<StaticTrip>>,
    cleared: bool,
    purge_before: Option<NaiveDate>,
}

/// Everything a buffer held, taken out for publication.
#[derive(Debug, Default)]
pub(crate) struct StagedChanges {
    pub rows: HashMap<TripKey, Arc<RealizedTimetableRow>>,
    pub new_trips: HashMap<FeedScopedId, Arc<StaticTrip>>,
    pub cleared: bool,
    pub purge_before: Option<NaiveDate>,
}

impl SnapshotBuffer {
    pub fn new(feed_id: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            rows: HashMap::new(),
            new_trips: HashMap::new(),
            cleared: false,
            purge_before: None,
        }
    }

    /// Returns the feed this buffer stages changes for.
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// Stages a row under its trip key, replacing any staged row.
    pub fn stage(&mut self, row: RealizedTimetableRow) {
        trace!(trip = %row.key, state = %row.state, "Staged row");
        self.rows.insert(row.key.clone(), Arc::new(row));
    }

    /// Stages a row for a trip that is not in the static schedule.
    pub fn stage_new_trip(&mut self, trip: Arc<StaticTrip>, row: RealizedTimetableRow) {
        self.new_trips.insert(trip.id.clone(), trip);
        self.stage(row);
    }

    /// Returns the staged row for a key.
    pub fn get(&self, key: &TripKey) -> Option<&Arc<RealizedTimetableRow>> {
        self.rows.get(key)
    }

    /// Returns a staged added trip.
    pub fn added_trip(&self, id: &FeedScopedId) -> Option<&Arc<StaticTrip>> {
        self.new_trips.get(id)
    }

    /// Drops everything staged and marks the feed's published realtime
    /// data for removal at the next publish.
    pub fn clear_feed(&mut self) {
        self.rows.clear();
        self.new_trips.clear();
        self.cleared = true;
    }

    /// Drops staged rows dated before `before`, along with added trips
    /// left without a staged row.
    pub fn drop_expired(&mut self, before: NaiveDate) {
        self.rows.retain(|key, _| key.service_date >= before);
        let rows = &self.rows;
        self.new_trips
            .retain(|id, _| rows.keys().any(|key| key.trip_id == *id));
    }

    /// Drops expired staged rows and marks older published rows of the
    /// feed for removal at the next publish.
    ///
    /// Marking makes the buffer dirty, so only call this when the
    /// published snapshot actually holds expired rows.
    pub fn purge_expired(&mut self, before: NaiveDate) {
        self.drop_expired(before);
        self.purge_before = Some(self.purge_before.map_or(before, |d| d.max(before)));
    }

    /// Returns true if published realtime data is being replaced wholesale.
    ///
    /// While set, lookups must not fall back to the published snapshot.
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Returns true if a publish would change anything.
    pub fn is_dirty(&self) -> bool {
        !self.rows.is_empty() || self.cleared || self.purge_before.is_some()
    }

    /// Returns the number of staged rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows are staged.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Takes all staged changes, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> StagedChanges {
        StagedChanges {
            rows: std::mem::take(&mut self.rows),
            new_trips: std::mem::take(&mut self.new_trips),
            cleared: std::mem::replace(&mut self.cleared, false),
            purge_before: self.purge_before.take(),
        }
    }
}
