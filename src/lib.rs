//! feedcourier - feed ingestion and delivery
//!
//! Polls RSS/Atom feeds on per-source intervals, extracts the linked
//! articles through an anti-bot proxy, stores them with a per-source
//! watermark and posts them to a Telegram chat with like/dislike buttons.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod feed;
pub mod ingest;
pub mod logging;
pub mod notify;
pub mod retrieve;
pub mod store;

pub use config::Config;
pub use db::Database;
pub use error::{CourierError, Result};
pub use extract::{ArticleExtractor, ExtractedArticle, ReadabilityExtractor};
pub use feed::{ContentFetcher, Item, RssFetcher};
pub use ingest::{job_queue, CycleReport, Job, JobSender, Planner, Worker};
pub use notify::{Notifier, TelegramBot};
pub use retrieve::{FlareSolverr, PageRetriever, RetrieveOptions, RetrievedPage};
pub use store::{
    Article, NewArticle, Reaction, ReactionKind, SqlStore, StoreTx, WatermarkStore,
};
