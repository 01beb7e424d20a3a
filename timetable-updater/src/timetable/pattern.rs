//! Stop pattern synthesis for realtime-modified and added trips.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::{FeedScopedId, StopPattern};
use crate::schedule::ScheduleIndex;

/// Derives or reuses stop patterns by route and stop sequence.
///
/// Seeded with a feed's static patterns, so a realtime stop sequence that
/// matches a scheduled one of the same route reuses it. New sequences get
/// a fresh id of the form `route:RTn` and are remembered for later updates.
#[derive(Debug)]
pub struct PatternSynthesizer {
    by_key: HashMap<(FeedScopedId, Vec<FeedScopedId>), Arc<StopPattern>>,
    next_id: usize,
}

impl PatternSynthesizer {
    /// Creates a synthesizer seeded with a feed's static patterns.
    pub fn new(feed_id: &str, schedule: &ScheduleIndex) -> Self {
        let by_key = schedule
            .trips()
            .filter(|t| t.id.feed_id() == feed_id)
            .filter_map(|t| {
                let pattern = schedule.pattern(&t.pattern_id)?;
                Some(((t.route_id.clone(), pattern.stops.clone()), Arc::clone(pattern)))
            })
            .collect();
        Self {
            by_key,
            next_id: 0,
        }
    }

    /// Returns the pattern for a stop sequence, creating one if needed.
    ///
    /// The second element is true if the pattern was newly created.
    pub fn synthesize(
        &mut self,
        route_id: &FeedScopedId,
        stops: &[FeedScopedId],
    ) -> (Arc<StopPattern>, bool) {
        let key = (route_id.clone(), stops.to_vec());
        if let Some(p) = self.by_key.get(&key) {
            return (Arc::clone(p), false);
        }

        let id = route_id.with_suffix(&format!(":RT{}", self.next_id));
        self.next_id += 1;
        let pattern = Arc::new(StopPattern::new(id, stops.to_vec()));
        debug!(pattern = %pattern.id, stops = stops.len(), "Synthesized stop pattern");
        self.by_key.insert(key, Arc::clone(&pattern));
        (pattern, true)
    }

    /// Returns the number of known patterns.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Returns true if no patterns are known.
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
