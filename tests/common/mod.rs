//! Test helpers for integration tests.
//!
//! Provides in-memory and file-backed stores, scripted fakes for every pipeline
//! collaborator and a small HTTP server for exercising the HTTP adapters.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use feedcourier::{
    ArticleExtractor, ContentFetcher, CourierError, Database, ExtractedArticle, Item, Notifier,
    PageRetriever, Result, RetrieveOptions, RetrievedPage, SqlStore, Worker,
};

/// Create a store over a fresh in-memory database.
pub async fn setup_store() -> Arc<SqlStore> {
    let db = Database::open_in_memory().await.unwrap();
    Arc::new(SqlStore::new(Arc::new(db), Duration::from_secs(5)))
}

/// Create a store over a database file in `dir`, with a pool of five
/// connections.
pub async fn setup_file_store(dir: &Path) -> Arc<SqlStore> {
    let url = format!("sqlite://{}", dir.join("courier.db").display());
    let db = Database::open(&url, 5).await.unwrap();
    Arc::new(SqlStore::new(Arc::new(db), Duration::from_secs(5)))
}

/// Build a feed item.
pub fn item(source: &str, link: &str, time: DateTime<Utc>) -> Item {
    Item {
        source: source.to_string(),
        title: format!("Title of {link}"),
        description: format!("Description of {link}"),
        link: link.to_string(),
        time,
    }
}

/// Fetcher serving scripted items per source.
///
/// Honors the fetcher contract: only items strictly newer than `since` are
/// returned, in scripted order.
#[derive(Default)]
pub struct FakeFetcher {
    items: Mutex<HashMap<String, Vec<Item>>>,
    failure: Mutex<Option<String>>,
    ignore_since: Mutex<bool>,
    calls: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl FakeFetcher {
    pub fn set_items(&self, source: &str, items: Vec<Item>) {
        self.items.lock().unwrap().insert(source.to_string(), items);
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Return every scripted item regardless of `since`.
    pub fn ignore_since(&self) {
        *self.ignore_since.lock().unwrap() = true;
    }

    /// Every `(source, since)` pair the fetcher was called with.
    pub fn calls(&self) -> Vec<(String, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, source: &str, since: DateTime<Utc>) -> Result<Vec<Item>> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_string(), since));

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(CourierError::Feed(message));
        }

        let ignore_since = *self.ignore_since.lock().unwrap();
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(source)
            .map(|items| {
                items
                    .iter()
                    .filter(|i| ignore_since || i.time > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Retriever that renders a tiny page per link.
#[derive(Default)]
pub struct FakeRetriever {
    statuses: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<(String, bool)>>,
}

impl FakeRetriever {
    /// Report `status` instead of "ok" for `link`.
    pub fn set_status(&self, link: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(link.to_string(), status.to_string());
    }

    /// Every `(url, disable_media)` pair requested.
    pub fn requests(&self) -> Vec<(String, bool)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageRetriever for FakeRetriever {
    async fn retrieve(&self, url: &str, options: &RetrieveOptions) -> Result<RetrievedPage> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), options.disable_media));

        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| "ok".to_string());

        Ok(RetrievedPage {
            message: if status == "ok" {
                String::new()
            } else {
                "challenge failed".to_string()
            },
            status,
            url: url.to_string(),
            html: format!("<html><body><p>Body of {url}</p></body></html>"),
        })
    }
}

/// Extractor that echoes the page URL, failing for chosen links.
#[derive(Default)]
pub struct FakeExtractor {
    fail_on: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn fail_on(&self, link: &str) {
        self.fail_on.lock().unwrap().push(link.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_on.lock().unwrap().clear();
    }
}

impl ArticleExtractor for FakeExtractor {
    fn extract(&self, html: &str, base_url: &Url) -> Result<ExtractedArticle> {
        if self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|l| l == base_url.as_str())
        {
            return Err(CourierError::Extract("not an article".to_string()));
        }
        Ok(ExtractedArticle {
            title: format!("Article at {base_url}"),
            text: html.to_string(),
            excerpt: String::new(),
            language: "en".to_string(),
        })
    }
}

/// Notifier that records deliveries.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Option<i64>)>>,
    fail_on: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn fail_on(&self, link: &str) {
        self.fail_on.lock().unwrap().push(link.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_on.lock().unwrap().clear();
    }

    /// Delivered `(link, article_id)` pairs, in delivery order.
    pub fn sent(&self) -> Vec<(String, Option<i64>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_links(&self) -> Vec<String> {
        self.sent().into_iter().map(|(link, _)| link).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, item: &Item, article_id: Option<i64>) -> Result<()> {
        if self.fail_on.lock().unwrap().contains(&item.link) {
            return Err(CourierError::Notify("chat unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((item.link.clone(), article_id));
        Ok(())
    }
}

/// A worker over an in-memory store and fakes, with handles to each part.
pub struct Harness {
    pub store: Arc<SqlStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub retriever: Arc<FakeRetriever>,
    pub extractor: Arc<FakeExtractor>,
    pub notifier: Arc<RecordingNotifier>,
    pub worker: Worker,
}

impl Harness {
    /// Build a harness with the given sources registered.
    pub async fn new(sources: &[&str]) -> Self {
        let store = setup_store().await;
        feedcourier::app::register_sources(store.as_ref(), sources.iter().copied())
            .await
            .unwrap();

        let fetcher = Arc::new(FakeFetcher::default());
        let retriever = Arc::new(FakeRetriever::default());
        let extractor = Arc::new(FakeExtractor::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let worker = Worker::new(
            store.clone(),
            fetcher.clone(),
            retriever.clone(),
            extractor.clone(),
            notifier.clone(),
        );

        Self {
            store,
            fetcher,
            retriever,
            extractor,
            notifier,
            worker,
        }
    }
}

/// A request received by [`MockHttpServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Value,
}

type MockHandler = Arc<dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync>;

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handler: MockHandler,
}

/// Local HTTP server answering every request from a handler.
pub struct MockHttpServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl MockHttpServer {
    /// Start a server on an ephemeral local port. The handler returns the
    /// status code and JSON body for each request.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = MockState {
            requests: Arc::clone(&requests),
            handler: Arc::new(handler),
        };
        let app = Router::new().fallback(record_request).with_state(state);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            task,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths of all received requests, in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn record_request(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let request = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    let (status, response) = (state.handler)(&request);
    state.requests.lock().unwrap().push(request);

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], response).into_response()
}
