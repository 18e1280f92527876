//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the identifying user agent string
//! - Classifying responses into crawl outcomes
//! - Timeout backoff for slow or unreachable servers

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::parser::parse_html;
use crate::crawler::politeness::Backoff;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Errors outside the classified outcomes; callers treat them like a skip
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response arrived but its body could not be read
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A page worth indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub title: String,
    pub text: String,
    /// Raw `href` values of the page's anchors
    pub links: Vec<String>,
}

/// Classified result of a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTML page with a title and text
    Success(FetchedPage),

    /// Not indexable: wrong content type, non-OK status, empty page
    Skip { reason: String },

    /// The server stayed too slow even with the largest timeout
    TransientSlow,

    /// HTTP 503 or 429
    RateLimited,
}

impl FetchOutcome {
    /// Short label used in log fields
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Skip { .. } => "skip",
            Self::TransientSlow => "transient_slow",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// Source of pages for the crawl engine and the update daemon
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, starting with `timeout` for the first attempt
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchOutcome, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by `reqwest`
///
/// # Classification
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | 2xx, `text/html`, non-empty title and text | `Success` |
/// | HTTP 503 or 429 | `RateLimited` |
/// | Any other status or content | `Skip` |
/// | Timeout (headers or body) or connection error | retry with a longer timeout |
/// | Timeout grew past the ceiling, or attempts used up | `TransientSlow` |
pub struct HttpFetcher {
    client: Client,
    backoff: Backoff,
}

impl HttpFetcher {
    pub fn new(user_agent: &UserAgentConfig, crawler: &CrawlerConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_http_client(user_agent)?,
            backoff: Backoff::from_config(crawler),
        })
    }

    pub fn with_client(client: Client, backoff: Backoff) -> Self {
        Self { client, backoff }
    }

    /// One request with `timeout` covering both headers and body
    async fn attempt(&self, url: &Url, timeout: Duration) -> Result<Attempt, FetchError> {
        trace!(%url, timeout_ms = timeout.as_millis() as u64, "GET");
        let response = match self.client.get(url.clone()).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => return Ok(Attempt::TimedOut),
            Err(e) => return Err(e.into()),
        };

        let status = response.status();

        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::Done(FetchOutcome::RateLimited));
        }

        if !status.is_success() {
            return Ok(Attempt::Done(FetchOutcome::Skip {
                reason: format!("HTTP {}", status.as_u16()),
            }));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if !content_type.contains("text/html") {
            return Ok(Attempt::Done(FetchOutcome::Skip {
                reason: format!("content type '{}'", content_type),
            }));
        }

        // A server that stalls mid-body is as slow as one that never answers
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Ok(Attempt::TimedOut),
            Err(e) => {
                return Err(FetchError::InvalidResponse(format!(
                    "unreadable body: {}",
                    e
                )))
            }
        };
        let parsed = parse_html(&body);

        Ok(Attempt::Done(match parsed.title {
            Some(title) if !parsed.text.is_empty() => FetchOutcome::Success(FetchedPage {
                title,
                text: parsed.text,
                links: parsed.links,
            }),
            _ => FetchOutcome::Skip {
                reason: "page without title or text".to_string(),
            },
        }))
    }
}

/// Result of a single request inside the retry loop
enum Attempt {
    Done(FetchOutcome),
    TimedOut,
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchOutcome, FetchError> {
        let mut timeout = timeout;
        let mut attempts: u32 = 1;

        loop {
            match self.attempt(url, timeout).await? {
                Attempt::Done(outcome) => return Ok(outcome),
                Attempt::TimedOut => {
                    let Some(next) = self.backoff.next_timeout(timeout, attempts) else {
                        debug!(%url, attempts, "Server too slow, giving up");
                        return Ok(FetchOutcome::TransientSlow);
                    };
                    debug!(%url, attempts, next_timeout_ms = next.as_millis() as u64, "Slow server, retrying");
                    timeout = next;
                    attempts += 1;
                    tokio::time::sleep(timeout / 2).await;
                }
            }
        }
    }
}
