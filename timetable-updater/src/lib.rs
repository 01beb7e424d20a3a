//! Realtime timetable updater.
//!
//! Applies batches of estimated-timetable updates (delays, cancellations,
//! stop changes and extra journeys) on top of a static schedule, and
//! publishes the result as immutable snapshot versions that route searches
//! can read without locking.
//!
//! The pieces, bottom-up:
//!
//! - [`domain`]: ids, service times, calls, rows and realtime state.
//! - [`schedule`]: the static schedule index the updates refer to.
//! - [`feed`]: structured update batches as delivered by a feed adapter.
//! - [`resolve`]: finding the trip run an update is about.
//! - [`timetable`]: producing and validating updated rows.
//! - [`snapshot`]: staging rows and publishing snapshot versions.
//! - [`engine`]: per-feed orchestration and publish policy.
//! - [`runtime`]: tokio tasks driving one engine per feed.

pub mod domain;
pub mod engine;
pub mod feed;
pub mod resolve;
pub mod runtime;
pub mod schedule;
pub mod snapshot;
pub mod timetable;
