//! Immutable, versioned snapshots of the realized timetable.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{FeedScopedId, RealizedTimetableRow, StaticTrip, StopPattern, TripKey};

use super::buffer::StagedChanges;

/// One published state of the realtime timetable.
///
/// Holds only runs that realtime data has touched; everything else is as
/// scheduled. A version is never mutated after publication: the next one
/// is built alongside it, sharing unchanged rows behind `Arc`.
#[derive(Debug, Default)]
pub struct SnapshotVersion {
    version: u64,
    rows: HashMap<TripKey, Arc<RealizedTimetableRow>>,
    added_trips: HashMap<FeedScopedId, Arc<StaticTrip>>,
    /// Patterns referenced by realtime rows
    patterns: HashMap<FeedScopedId, Arc<StopPattern>>,
}

impl SnapshotVersion {
    /// Returns the empty initial version, numbered zero.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns this version's number.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the realized row for a trip run, if realtime data exists.
    pub fn row_for(&self, key: &TripKey) -> Option<&Arc<RealizedTimetableRow>> {
        self.rows.get(key)
    }

    /// Returns a trip added by a realtime feed.
    pub fn added_trip(&self, id: &FeedScopedId) -> Option<&Arc<StaticTrip>> {
        self.added_trips.get(id)
    }

    /// Returns a pattern used by a realtime row, including synthesized ones.
    pub fn pattern(&self, id: &FeedScopedId) -> Option<&Arc<StopPattern>> {
        self.patterns.get(id)
    }

    /// Returns the rows a route search should see.
    ///
    /// Cancelled trips are hidden unless planned cancellations are
    /// requested, in which case they are returned for display.
    pub fn rows_for_search(
        &self,
        include_planned_cancellations: bool,
    ) -> impl Iterator<Item = &Arc<RealizedTimetableRow>> {
        self.rows
            .values()
            .filter(move |row| include_planned_cancellations || !row.is_cancelled())
    }

    /// Returns true if a feed has rows dated before `before`.
    pub fn has_rows_before(&self, feed_id: &str, before: NaiveDate) -> bool {
        self.rows
            .keys()
            .any(|key| key.feed_id() == feed_id && key.service_date < before)
    }

    /// Returns the number of realized rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no realtime data is held.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds the successor version with one feed's staged changes applied.
    pub(crate) fn successor(&self, feed_id: &str, changes: StagedChanges) -> Self {
        let mut rows = self.rows.clone();
        let mut added_trips = self.added_trips.clone();

        if changes.cleared {
            rows.retain(|key, _| key.feed_id() != feed_id);
            added_trips.retain(|id, _| id.feed_id() != feed_id);
        }
        if let Some(before) = changes.purge_before {
            let before_count = rows.len();
            rows.retain(|key, _| key.feed_id() != feed_id || key.service_date >= before);
            let live: HashSet<&FeedScopedId> = rows.keys().map(|k| &k.trip_id).collect();
            added_trips.retain(|id, _| id.feed_id() != feed_id || live.contains(id));
            debug!(
                feed = feed_id,
                %before,
                purged = before_count - rows.len(),
                "Purged expired realtime rows"
            );
        }

        rows.extend(changes.rows);
        added_trips.extend(changes.new_trips);

        let patterns = rows
            .values()
            .map(|row| (row.pattern.id.clone(), Arc::clone(&row.pattern)))
            .collect();

        Self {
            version: self.version + 1,
            rows,
            added_trips,
            patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ScheduledStopTime, ServiceTime};
    use chrono::NaiveDate;

    fn id(feed: &str, s: &str) -> FeedScopedId {
        FeedScopedId::new(feed, s).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn row(feed: &str, name: &str, day: u32) -> RealizedTimetableRow {
        let t = ServiceTime::from_seconds;
        let trip = StaticTrip {
            id: id(feed, name),
            route_id: id(feed, "R1"),
            service_id: id(feed, "S1"),
            pattern_id: id(feed, "P1"),
            stop_times: vec![
                ScheduledStopTime::new(id(feed, "A1"), t(10), t(11)),
                ScheduledStopTime::new(id(feed, "B1"), t(20), t(21)),
            ],
        };
        let pattern = Arc::new(StopPattern::new(
            id(feed, "P1"),
            vec![id(feed, "A1"), id(feed, "B1")],
        ));
        RealizedTimetableRow::from_trip(TripKey::new(trip.id.clone(), date(day)), &trip, pattern)
    }

    fn changes(rows: Vec<RealizedTimetableRow>) -> StagedChanges {
        StagedChanges {
            rows: rows.into_iter().map(|r| (r.key.clone(), Arc::new(r))).collect(),
            ..StagedChanges::default()
        }
    }

    #[test]
    fn successor_increments_version_and_merges() {
        let v0 = SnapshotVersion::empty();
        let v1 = v0.successor("F", changes(vec![row("F", "T1", 8)]));
        let v2 = v1.successor("F", changes(vec![row("F", "T2", 8)]));

        assert_eq!(v0.version(), 0);
        assert_eq!(v1.version(), 1);
        assert_eq!(v2.version(), 2);
        assert_eq!(v1.len(), 1);
        assert_eq!(v2.len(), 2);
        assert!(v2.pattern(&id("F", "P1")).is_some());
    }

    #[test]
    fn successor_shares_unchanged_rows() {
        let v1 = SnapshotVersion::empty().successor("F", changes(vec![row("F", "T1", 8)]));
        let v2 = v1.successor("F", changes(vec![row("F", "T2", 8)]));
        let key = TripKey::new(id("F", "T1"), date(8));
        assert!(Arc::ptr_eq(v1.row_for(&key).unwrap(), v2.row_for(&key).unwrap()));
    }

    #[test]
    fn expired_rows_are_detected_per_feed() {
        let v1 = SnapshotVersion::empty().successor("F", changes(vec![row("F", "T1", 8)]));
        let v2 = v1.successor("G", changes(vec![row("G", "T1", 6)]));

        assert!(!v2.has_rows_before("F", date(8)));
        assert!(v2.has_rows_before("F", date(9)));
        assert!(v2.has_rows_before("G", date(7)));
        assert!(!v2.has_rows_before("H", date(9)));
    }

    #[test]
    fn search_view_hides_cancellations_unless_asked() {
        let v1 = SnapshotVersion::empty().successor(
            "F",
            changes(vec![row("F", "T1", 8), row("F", "T2", 8).cancelled()]),
        );
        assert_eq!(v1.rows_for_search(false).count(), 1);
        assert_eq!(v1.rows_for_search(true).count(), 2);
    }

    #[test]
    fn clearing_only_touches_own_feed() {
        let v1 = SnapshotVersion::empty().successor("F", changes(vec![row("F", "T1", 8)]));
        let v2 = v1.successor("G", changes(vec![row("G", "T1", 8)]));
        let v3 = v2.successor(
            "F",
            StagedChanges {
                cleared: true,
                ..StagedChanges::default()
            },
        );
        assert_eq!(v3.len(), 1);
        assert!(v3.row_for(&TripKey::new(id("G", "T1"), date(8))).is_some());
    }

    #[test]
    fn purge_removes_old_rows_and_orphaned_added_trips() {
        let mut staged = changes(vec![row("F", "T1", 5), row("F", "T1", 8)]);
        let old = row("F", "X", 5);
        let trip = Arc::new(StaticTrip {
            id: id("F", "X"),
            route_id: id("F", "R1"),
            service_id: id("F", "X"),
            pattern_id: id("F", "P1"),
            stop_times: vec![],
        });
        staged.new_trips.insert(trip.id.clone(), trip);
        staged.rows.insert(old.key.clone(), Arc::new(old));
        let v1 = SnapshotVersion::empty().successor("F", staged);
        assert!(v1.added_trip(&id("F", "X")).is_some());

        let v2 = v1.successor(
            "F",
            StagedChanges {
                purge_before: Some(date(7)),
                ..StagedChanges::default()
            },
        );
        assert_eq!(v2.len(), 1);
        assert!(v2.added_trip(&id("F", "X")).is_none());
    }
}
