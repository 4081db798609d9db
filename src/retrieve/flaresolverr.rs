//! FlareSolverr client.
//!
//! FlareSolverr renders a page in a headless browser, solving bot challenges
//! on the way, and returns the final HTML.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FlareSolverrConfig;
use crate::{CourierError, Result};

/// Status FlareSolverr reports for a solved request.
pub const STATUS_OK: &str = "ok";

/// Extra time the HTTP client waits beyond FlareSolverr's own deadline.
const CLIENT_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Per-request retrieval options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrieveOptions {
    /// Skip loading images, CSS and fonts.
    pub disable_media: bool,
}

/// A rendered page as reported by the proxy.
#[derive(Debug, Clone, Default)]
pub struct RetrievedPage {
    /// Proxy status, `"ok"` on success.
    pub status: String,
    /// Proxy message, explains a non-ok status.
    pub message: String,
    /// Final URL after redirects.
    pub url: String,
    /// Rendered HTML.
    pub html: String,
}

impl RetrievedPage {
    /// Whether the proxy solved the request.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Fetches rendered HTML for a URL.
#[async_trait]
pub trait PageRetriever: Send + Sync {
    /// Retrieve a page.
    ///
    /// Transport failures are errors. A page with a non-ok status is
    /// returned as is; callers decide how to treat it.
    async fn retrieve(&self, url: &str, options: &RetrieveOptions) -> Result<RetrievedPage>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveRequest<'a> {
    cmd: &'a str,
    url: &'a str,
    max_timeout: u64,
    disable_media: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SolveResponse {
    status: String,
    message: String,
    solution: Option<Solution>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Solution {
    url: String,
    status: u16,
    response: String,
    user_agent: String,
}

impl From<SolveResponse> for RetrievedPage {
    fn from(resp: SolveResponse) -> Self {
        let solution = resp.solution.unwrap_or_default();
        RetrievedPage {
            status: resp.status,
            message: resp.message,
            url: solution.url,
            html: solution.response,
        }
    }
}

/// FlareSolverr v1 API client.
pub struct FlareSolverr {
    client: reqwest::Client,
    endpoint: String,
    max_timeout_ms: u64,
}

impl FlareSolverr {
    /// Create a client for the configured endpoint.
    pub fn new(config: &FlareSolverrConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.max_timeout_ms) + CLIENT_TIMEOUT_MARGIN)
            .build()
            .map_err(|e| CourierError::Retrieve(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.url.clone(),
            max_timeout_ms: config.max_timeout_ms,
        })
    }
}

#[async_trait]
impl PageRetriever for FlareSolverr {
    async fn retrieve(&self, url: &str, options: &RetrieveOptions) -> Result<RetrievedPage> {
        let request = SolveRequest {
            cmd: "request.get",
            url,
            max_timeout: self.max_timeout_ms,
            disable_media: options.disable_media,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| CourierError::Retrieve(format!("request to FlareSolverr failed: {}", e)))?;

        // FlareSolverr answers failed solves with HTTP 500 and a JSON body,
        // so the body is decoded before looking at the HTTP status.
        let http_status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CourierError::Retrieve(format!("failed to read response: {}", e)))?;

        let decoded: SolveResponse = match serde_json::from_str(&body) {
            Ok(decoded) => decoded,
            Err(e) if http_status.is_success() => {
                return Err(CourierError::Retrieve(format!(
                    "invalid FlareSolverr response: {}",
                    e
                )));
            }
            Err(_) => {
                return Err(CourierError::Retrieve(format!(
                    "FlareSolverr HTTP error: {}",
                    http_status
                )));
            }
        };

        if let Some(solution) = &decoded.solution {
            debug!(
                "FlareSolverr solved {} (HTTP {}, user agent {})",
                url, solution.status, solution.user_agent
            );
        }

        Ok(decoded.into())
    }
}
