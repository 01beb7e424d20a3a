//! Feed-scoped identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid feed-scoped identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid feed-scoped id: {reason}")]
pub struct InvalidFeedScopedId {
    reason: &'static str,
}

/// An identifier unique within one data provider's namespace.
///
/// Every entity of the static schedule (trips, stops, routes, patterns,
/// services) is named by the feed it came from plus a local id. Neither
/// part may be empty.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::FeedScopedId;
///
/// let id = FeedScopedId::new("F", "TestTrip1").unwrap();
/// assert_eq!(id.feed_id(), "F");
/// assert_eq!(id.id(), "TestTrip1");
/// assert_eq!(id.to_string(), "F:TestTrip1");
///
/// let parsed = FeedScopedId::parse("F:TestTrip1").unwrap();
/// assert_eq!(parsed, id);
///
/// // Empty parts are rejected
/// assert!(FeedScopedId::new("", "x").is_err());
/// assert!(FeedScopedId::parse("no-separator").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedScopedId {
    feed_id: String,
    id: String,
}

impl FeedScopedId {
    /// Create a new id from its feed and local parts.
    ///
    /// Returns an error if either part is empty.
    pub fn new(feed_id: impl Into<String>, id: impl Into<String>) -> Result<Self, InvalidFeedScopedId> {
        let feed_id = feed_id.into();
        let id = id.into();
        if feed_id.is_empty() {
            return Err(InvalidFeedScopedId {
                reason: "feed id cannot be empty",
            });
        }
        if id.is_empty() {
            return Err(InvalidFeedScopedId {
                reason: "local id cannot be empty",
            });
        }
        Ok(Self { feed_id, id })
    }

    /// Parse an id from its `feed:id` form.
    ///
    /// Only the first colon separates the feed; the local part may itself
    /// contain colons.
    pub fn parse(s: &str) -> Result<Self, InvalidFeedScopedId> {
        let (feed_id, id) = s.split_once(':').ok_or(InvalidFeedScopedId {
            reason: "expected feed:id format",
        })?;
        Self::new(feed_id, id)
    }

    /// Returns the feed part.
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// Returns the local part.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns an id in the same feed with a different local part.
    pub fn sibling(&self, id: impl Into<String>) -> Result<Self, InvalidFeedScopedId> {
        Self::new(self.feed_id.clone(), id)
    }

    /// Returns an id in the same feed whose local part is this one's plus
    /// a suffix.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            feed_id: self.feed_id.clone(),
            id: format!("{}{}", self.id, suffix),
        }
    }
}

impl fmt::Debug for FeedScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedScopedId({}:{})", self.feed_id, self.id)
    }
}

impl fmt::Display for FeedScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.feed_id, self.id)
    }
}
