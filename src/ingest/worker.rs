//! The ingestion worker.
//!
//! Consumes jobs one at a time. Each job runs one ingestion cycle for its
//! source inside a single store transaction:
//!
//! 1. read the watermark, or start `bootstrap_lookback` before now;
//! 2. fetch the items newer than the watermark;
//! 3. for each item in fetch order: retrieve the page, extract the article,
//!    persist it and send a notification;
//! 4. move the watermark to the newest item time;
//! 5. commit.
//!
//! Any failure rolls the whole cycle back, leaving the watermark where it
//! was so the next tick retries the same items.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use super::job::{Job, JobReceiver};
use crate::extract::ArticleExtractor;
use crate::feed::{ContentFetcher, Item};
use crate::notify::Notifier;
use crate::retrieve::{PageRetriever, RetrieveOptions};
use crate::store::{NewArticle, StoreTx, WatermarkStore};
use crate::{CourierError, Result};

/// Default lookback for sources without a watermark.
pub const DEFAULT_BOOTSTRAP_LOOKBACK: Duration = Duration::from_secs(3600);

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub source: String,
    /// Number of articles persisted and notified.
    pub articles: usize,
    /// Stored watermark before the cycle, `None` on the first cycle.
    pub previous_watermark: Option<DateTime<Utc>>,
    /// Watermark after the cycle.
    pub watermark: DateTime<Utc>,
}

/// Sequential job processor.
pub struct Worker {
    store: Arc<dyn WatermarkStore>,
    fetcher: Arc<dyn ContentFetcher>,
    retriever: Arc<dyn PageRetriever>,
    extractor: Arc<dyn ArticleExtractor>,
    notifier: Arc<dyn Notifier>,
    retrieve_options: RetrieveOptions,
    bootstrap_lookback: Duration,
}

impl Worker {
    pub fn new(
        store: Arc<dyn WatermarkStore>,
        fetcher: Arc<dyn ContentFetcher>,
        retriever: Arc<dyn PageRetriever>,
        extractor: Arc<dyn ArticleExtractor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            fetcher,
            retriever,
            extractor,
            notifier,
            retrieve_options: RetrieveOptions::default(),
            bootstrap_lookback: DEFAULT_BOOTSTRAP_LOOKBACK,
        }
    }

    /// Set the options passed to the page retriever.
    pub fn with_retrieve_options(mut self, options: RetrieveOptions) -> Self {
        self.retrieve_options = options;
        self
    }

    /// Set how far back a source without a watermark starts.
    pub fn with_bootstrap_lookback(mut self, lookback: Duration) -> Self {
        self.bootstrap_lookback = lookback;
        self
    }

    /// Process jobs until the queue closes or `shutdown` turns true.
    ///
    /// Shutdown is only observed between jobs; a running cycle always
    /// completes.
    pub async fn run(&self, mut jobs: JobReceiver, mut shutdown: watch::Receiver<bool>) {
        info!("Worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            let job = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.handle(&job).await;
        }

        info!("Worker stopped");
    }

    /// Run one job and log its outcome.
    pub async fn handle(&self, job: &Job) -> bool {
        match self.process_job(job).await {
            Ok(report) if report.articles > 0 => {
                info!(
                    "Cycle for {} done: {} new article(s), watermark {}",
                    report.source,
                    report.articles,
                    report.watermark.to_rfc3339()
                );
                true
            }
            Ok(report) => {
                debug!("Cycle for {} done: no new items", report.source);
                true
            }
            Err(e) => {
                error!("Cycle for {} failed: {}", job.source, e);
                false
            }
        }
    }

    /// Run one ingestion cycle in its own transaction.
    pub async fn process_job(&self, job: &Job) -> Result<CycleReport> {
        let mut tx = self.store.begin().await?;

        let outcome = self.run_cycle(tx.as_mut(), &job.source).await;
        match outcome {
            Ok(report) => {
                tx.commit().await?;
                Ok(report)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback for {} failed: {}", job.source, rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, tx: &mut dyn StoreTx, source: &str) -> Result<CycleReport> {
        let previous = tx.get_watermark(source).await?;
        let since = match previous {
            Some(at) => at,
            None => Utc::now() - self.lookback(),
        };

        let items = self.fetcher.fetch(source, since).await?;
        debug!("Fetched {} item(s) for {} since {}", items.len(), source, since);

        let mut watermark = since;
        let mut articles = 0;
        for item in &items {
            if item.time <= since {
                warn!(
                    "Fetcher returned {} at {} which is not after {}, skipping",
                    item.link, item.time, since
                );
                continue;
            }
            watermark = watermark.max(item.time);

            self.process_item(tx, source, item)
                .await
                .map_err(|e| CourierError::for_item(&item.link, e))?;
            articles += 1;
        }

        if previous != Some(watermark) {
            tx.set_watermark(source, watermark).await?;
        }

        Ok(CycleReport {
            source: source.to_string(),
            articles,
            previous_watermark: previous,
            watermark,
        })
    }

    async fn process_item(&self, tx: &mut dyn StoreTx, source: &str, item: &Item) -> Result<()> {
        let page = self
            .retriever
            .retrieve(&item.link, &self.retrieve_options)
            .await?;
        if !page.is_ok() {
            return Err(CourierError::Retrieve(format!(
                "status {}: {}",
                page.status, page.message
            )));
        }

        let base = if page.url.is_empty() {
            &item.link
        } else {
            &page.url
        };
        let base_url = Url::parse(base)
            .map_err(|e| CourierError::Extract(format!("invalid page URL {base}: {e}")))?;
        let extracted = self.extractor.extract(&page.html, &base_url)?;

        let title = if extracted.title.is_empty() {
            item.title.clone()
        } else {
            extracted.title
        };
        let excerpt = if extracted.excerpt.is_empty() {
            item.description.clone()
        } else {
            extracted.excerpt
        };

        let article_id = tx
            .add_article(&NewArticle {
                source: source.to_string(),
                url: item.link.clone(),
                title,
                text_content: extracted.text,
                excerpt,
                language: extracted.language,
                published_at: item.time,
            })
            .await?;

        self.notifier.send(item, Some(article_id)).await?;
        debug!("Delivered {} as article {}", item.link, article_id);
        Ok(())
    }

    fn lookback(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.bootstrap_lookback).unwrap_or(chrono::Duration::hours(1))
    }
}
