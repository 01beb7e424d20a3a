//! Copy-on-write publication of the realized timetable.
//!
//! Each feed's writer stages rows into its own [`SnapshotBuffer`]. A
//! publish folds the buffer into a new immutable [`SnapshotVersion`] and
//! swaps it in atomically through the shared [`SnapshotPublisher`].
//! Readers never wait on writers and never see a half-applied batch.

mod buffer;
mod publisher;
mod version;

pub use buffer::SnapshotBuffer;
pub use publisher::SnapshotPublisher;
pub use version::SnapshotVersion;
