//! Atomic publication of snapshot versions.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::info;

use super::buffer::SnapshotBuffer;
use super::version::SnapshotVersion;

/// Holds the current snapshot version and publishes successors.
///
/// Readers call [`current`](Self::current) and keep the returned `Arc` for
/// as long as they need a consistent view; the load never blocks. Writers
/// of different feeds share one publisher, and publication is serialized
/// so that no feed's changes are lost to a concurrent publish.
///
/// # Examples
///
/// ```
/// use timetable_updater::snapshot::{SnapshotBuffer, SnapshotPublisher};
///
/// let publisher = SnapshotPublisher::new();
/// let before = publisher.current();
///
/// let mut buffer = SnapshotBuffer::new("F");
/// buffer.clear_feed();
/// let after = publisher.publish(&mut buffer);
///
/// assert_eq!(before.version(), 0);
/// assert_eq!(after.version(), 1);
/// assert_eq!(publisher.current().version(), 1);
/// ```
#[derive(Debug)]
pub struct SnapshotPublisher {
    current: ArcSwap<SnapshotVersion>,
    publish_lock: Mutex<()>,
}

impl SnapshotPublisher {
    /// Creates a publisher holding the empty version.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(SnapshotVersion::empty()),
            publish_lock: Mutex::new(()),
        }
    }

    /// Returns the latest published version.
    pub fn current(&self) -> Arc<SnapshotVersion> {
        self.current.load_full()
    }

    /// Publishes a buffer's staged changes as a new version.
    ///
    /// The buffer is emptied. Holders of earlier versions are unaffected.
    pub fn publish(&self, buffer: &mut SnapshotBuffer) -> Arc<SnapshotVersion> {
        let _guard = self
            .publish_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let changes = buffer.take();
        let staged = changes.rows.len();
        let next = Arc::new(self.current.load().successor(buffer.feed_id(), changes));
        self.current.store(Arc::clone(&next));

        info!(
            feed = buffer.feed_id(),
            version = next.version(),
            staged,
            rows = next.len(),
            "Published timetable snapshot"
        );
        next
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}
