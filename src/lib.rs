//! Gugel: a single-server crawler that keeps a text index fresh
//!
//! This crate crawls one web server at a time, feeds the discovered documents
//! into a shared on-disk index, and periodically re-fetches stale documents.
//! Access to the index is serialized by an explicit priority coordinator so a
//! live crawl, the update daemon and index readers can share one store.

pub mod access;
pub mod config;
pub mod crawler;
pub mod daemon;
pub mod index;
pub mod state;
pub mod stats;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Gugel operations
#[derive(Debug, Error)]
pub enum GugelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Cannot persist crawl state to {path}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GugelError {
    /// Wraps an I/O error that happened while writing a state file
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Excluded URL: {0}")]
    Excluded(String),
}

/// Result type alias for Gugel operations
pub type Result<T> = std::result::Result<T, GugelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use access::{AccessCoordinator, AccessGrant, AccessHandle, Priority};
pub use config::Config;
pub use crawler::{CrawlEngine, FetchOutcome, Fetcher, HttpFetcher};
pub use daemon::{Schedule, UpdateDaemon};
pub use index::{Document, IndexStore, SqliteIndex};
pub use state::{CrawlTask, PendingEntry, PendingUpdates, VisitedSet};
pub use crate::url::{normalize_url, resolve_link, same_server};
