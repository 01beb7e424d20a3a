//! Timetable mutation: validation, call matching and pattern synthesis.
//!
//! Everything here is synchronous and side-effect free apart from the
//! [`PatternSynthesizer`]'s memory of patterns it has created.

mod mutate;
mod pattern;
mod validate;

pub use mutate::{AddedJourney, MutationError, TimetableMutator};
pub use pattern::PatternSynthesizer;
pub use validate::{TimeViolation, validate, validate_times};
