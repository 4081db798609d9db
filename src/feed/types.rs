//! Feed item types.

use chrono::{DateTime, Utc};

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;

/// A candidate item discovered while fetching a source.
///
/// Items are transient: only the article extracted from an item is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Name of the source the item was fetched from.
    pub source: String,
    /// Item title.
    pub title: String,
    /// Plain-text description, may be empty.
    pub description: String,
    /// Link to the full content. Identifies the item.
    pub link: String,
    /// Update time if the feed gives one, else publish time, else fetch time.
    pub time: DateTime<Utc>,
}
