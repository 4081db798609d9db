//! Watermark store.
//!
//! Persists sources with their per-source watermark, the articles extracted
//! from feed items, and reactions to delivered articles. All mutating
//! operations of an ingestion cycle run on a [`StoreTx`] handle obtained from
//! [`WatermarkStore::begin`]; dropping the handle without committing rolls
//! the transaction back.

mod sql;

pub use sql::{SqlStore, SqlTx};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;

/// Kind of feedback a notification recipient can leave on an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    /// Thumbs up.
    Like,
    /// Thumbs down.
    Dislike,
}

impl ReactionKind {
    /// Convert to the stored string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    /// Parse from the stored string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }

    /// Numeric code used in button callback data.
    pub fn code(&self) -> u8 {
        match self {
            ReactionKind::Like => 0,
            ReactionKind::Dislike => 1,
        }
    }

    /// Look up a kind by its callback code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ReactionKind::Like),
            1 => Some(ReactionKind::Dislike),
            _ => None,
        }
    }

    /// Emoji shown on the button and set as the message reaction.
    pub fn emoji(&self) -> &'static str {
        match self {
            ReactionKind::Like => "👍",
            ReactionKind::Dislike => "👎",
        }
    }
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Article to persist, derived from one feed item.
#[derive(Debug, Clone)]
pub struct NewArticle {
    /// Name of the source the item came from.
    pub source: String,
    /// Link of the feed item.
    pub url: String,
    /// Extracted title.
    pub title: String,
    /// Extracted plain text.
    pub text_content: String,
    /// Short summary.
    pub excerpt: String,
    /// Language tag, empty when unknown.
    pub language: String,
    /// Timestamp of the feed item.
    pub published_at: DateTime<Utc>,
}

/// A persisted article.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub title: String,
    pub text_content: String,
    pub excerpt: String,
    pub language: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A persisted reaction.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub id: i64,
    pub article_id: i64,
    pub kind: ReactionKind,
    pub created_at: DateTime<Utc>,
}

/// Entry point to the store.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Register a source by name and return its id.
    ///
    /// Fails with `SourceAlreadyExists` when the name is taken; the existing
    /// record is left untouched.
    async fn create_source(&self, name: &str) -> Result<i64>;

    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

/// Transaction-scoped store handle.
///
/// Every operation participates in the same atomic unit. Nothing is visible
/// to other handles until [`StoreTx::commit`].
#[async_trait]
pub trait StoreTx: Send {
    /// Read the watermark of a source. `None` when the source has never
    /// completed a cycle; `NotFound` when the source is not registered.
    async fn get_watermark(&mut self, source: &str) -> Result<Option<DateTime<Utc>>>;

    /// Overwrite the watermark of a registered source.
    async fn set_watermark(&mut self, source: &str, at: DateTime<Utc>) -> Result<()>;

    /// Persist an article and return its id.
    async fn add_article(&mut self, article: &NewArticle) -> Result<i64>;

    /// Record a reaction to a persisted article.
    async fn add_reaction(&mut self, article_id: i64, kind: ReactionKind) -> Result<i64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_kind_string_roundtrip() {
        for kind in [ReactionKind::Like, ReactionKind::Dislike] {
            assert_eq!(ReactionKind::parse(kind.as_str()), Some(kind));
            assert_eq!(ReactionKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ReactionKind::parse("meh"), None);
        assert_eq!(ReactionKind::from_code(7), None);
    }

    #[test]
    fn test_reaction_kind_codes_and_emoji() {
        assert_eq!(ReactionKind::Like.code(), 0);
        assert_eq!(ReactionKind::Dislike.code(), 1);
        assert_eq!(ReactionKind::Like.emoji(), "👍");
        assert_eq!(ReactionKind::Dislike.emoji(), "👎");
        assert_eq!(ReactionKind::Dislike.to_string(), "dislike");
    }
}
