//! RSS/Atom feed fetcher.
//!
//! Fetches a source's feed over HTTP with timeouts and a body size cap,
//! parses it with feed-rs and keeps the items newer than the watermark.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, warn};

use super::types::{Item, MAX_DESCRIPTION_LENGTH};
use crate::config::FetcherConfig;
use crate::extract::normalize_whitespace;
use crate::{CourierError, Result};

/// Source of candidate items.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Return the items of `source` strictly newer than `since`, oldest first.
    async fn fetch(&self, source: &str, since: DateTime<Utc>) -> Result<Vec<Item>>;
}

/// Feed fetcher over HTTP.
pub struct RssFetcher {
    client: Client,
    feeds: HashMap<String, String>,
    max_feed_size: u64,
}

impl RssFetcher {
    /// Create a fetcher for the given source name to feed URL map.
    pub fn new(config: &FetcherConfig, feeds: HashMap<String, String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| CourierError::Feed(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            feeds,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    /// Download a feed body, enforcing the size limit.
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CourierError::Feed(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CourierError::Feed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(self.too_large(content_length));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CourierError::Feed(format!("failed to read response: {}", e)))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_feed_size {
                return Err(self.too_large(body.len() as u64));
            }
        }

        Ok(body)
    }

    fn too_large(&self, size: u64) -> CourierError {
        CourierError::Feed(format!(
            "feed too large: {} bytes (max {} bytes)",
            size, self.max_feed_size
        ))
    }
}

#[async_trait]
impl ContentFetcher for RssFetcher {
    async fn fetch(&self, source: &str, since: DateTime<Utc>) -> Result<Vec<Item>> {
        let url = self
            .feeds
            .get(source)
            .ok_or_else(|| CourierError::NotFound(format!("source '{source}'")))?;

        debug!("Fetching feed for {} from {}", source, url);
        let body = self.download(url).await?;
        parse_items(&body, source, since, Utc::now())
    }
}

/// Parse feed bytes into the items newer than `since`.
///
/// Items without a timestamp are stamped with `now`. Items without a link are
/// skipped. The result is sorted oldest first; items with equal timestamps
/// keep their feed order.
pub fn parse_items(
    bytes: &[u8],
    source: &str,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<Item>> {
    let feed =
        parser::parse(bytes).map_err(|e| CourierError::Feed(format!("failed to parse feed: {}", e)))?;

    let mut items = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let time = entry.updated.or(entry.published).unwrap_or(now);
        if time <= since {
            continue;
        }

        let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
            warn!("Skipping item {} from {}: no link", entry.id, source);
            continue;
        };

        let title = entry
            .title
            .map(|t| html_to_text(&t.content))
            .unwrap_or_else(|| "Untitled".to_string());
        let description = entry
            .summary
            .map(|t| t.content)
            .or(entry.content.and_then(|c| c.body))
            .map(|d| truncate_description(&html_to_text(&d)))
            .unwrap_or_default();

        items.push(Item {
            source: source.to_string(),
            title,
            description,
            link,
            time,
        });
    }

    items.sort_by_key(|item| item.time);
    Ok(items)
}

/// Plain text of an HTML fragment, entities decoded and whitespace collapsed.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    normalize_whitespace(&text)
}

fn truncate_description(text: &str) -> String {
    match text.char_indices().nth(MAX_DESCRIPTION_LENGTH) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
