//! Feed fetching.
//!
//! A [`ContentFetcher`] turns a source name and a watermark into the list of
//! items published after that watermark. [`RssFetcher`] implements it for
//! RSS and Atom feeds.

mod fetcher;
mod types;

pub use fetcher::{parse_items, ContentFetcher, RssFetcher};
pub use types::{Item, MAX_DESCRIPTION_LENGTH};
