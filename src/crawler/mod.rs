//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with timeout backoff
//! - HTML parsing and link extraction
//! - Politeness delay between requests
//! - Batching of documents before they reach the index
//! - The crawl engine that drives single-server passes

mod batch;
mod engine;
mod fetcher;
mod parser;
mod politeness;

pub use batch::BatchBuffer;
pub use engine::{CrawlEngine, CrawlSettings, PassReport};
pub use fetcher::{build_http_client, FetchError, FetchOutcome, FetchedPage, Fetcher, HttpFetcher};
pub use parser::{parse_html, ParsedPage};
pub use politeness::{Backoff, Politeness};

#[cfg(test)]
pub(crate) use engine::tests::{test_settings, ScriptedFetcher};
