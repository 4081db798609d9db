//! Article extraction.
//!
//! Turns rendered HTML into a readable article: title, plain text, a short
//! excerpt and the document language.

mod readable;

pub use readable::ReadabilityExtractor;

use url::Url;

use crate::Result;

/// Maximum excerpt length in characters when it is derived from the text.
pub const EXCERPT_LENGTH: usize = 200;

/// Article extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub text: String,
    pub excerpt: String,
    /// Language tag, empty when the page doesn't declare one.
    pub language: String,
}

/// Extracts an article from HTML.
pub trait ArticleExtractor: Send + Sync {
    /// Extract the article. `base_url` resolves relative links.
    ///
    /// Fails when the page holds no readable text.
    fn extract(&self, html: &str, base_url: &Url) -> Result<ExtractedArticle>;
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
