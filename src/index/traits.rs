//! Index store trait and error types
//!
//! The crawler and the update daemon only talk to the index through
//! [`IndexStore`]; the SQLite backend is one implementation of it.

use chrono::{DateTime, Utc};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during index operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// The store's own lock is held by another connection or process
    #[error("Index is locked by another connection")]
    Busy,

    #[error("Index access coordinator has shut down")]
    CoordinatorClosed,

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Returns true for the lock-busy condition callers must retry
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Busy
            }
            _ => Self::Sqlite(error),
        }
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// A page as stored in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    pub observed_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            observed_at,
        }
    }
}

/// An indexed URL together with the time it was last fetched successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleDocument {
    pub url: String,
    pub last_seen: DateTime<Utc>,
}

/// Trait for index backends
///
/// Every operation may fail with [`IndexError::Busy`] when another
/// connection holds the store's lock. Callers route writes through the
/// access coordinator, which retries on that error.
pub trait IndexStore: Send {
    /// Adds a document, replacing any document with the same URL
    fn add(&mut self, doc: &Document) -> IndexResult<()>;

    /// Adds several documents in one transaction
    ///
    /// Either all documents are written or none are.
    fn add_batch(&mut self, docs: &[Document]) -> IndexResult<()>;

    /// Replaces the document for `doc.url`, inserting it if absent
    fn update(&mut self, doc: &Document) -> IndexResult<()>;

    /// Deletes the document for `url`
    ///
    /// # Returns
    ///
    /// `true` if a document was removed
    fn delete(&mut self, url: &str) -> IndexResult<bool>;

    /// Checks whether `url` is indexed
    fn exists(&self, url: &str) -> IndexResult<bool>;

    /// Returns up to `limit` documents last observed at least `age_days` ago,
    /// oldest first
    fn find_stale(&self, age_days: u32, limit: usize) -> IndexResult<Vec<StaleDocument>>;

    /// Fetches a single document
    fn get(&self, url: &str) -> IndexResult<Option<Document>>;

    /// Number of indexed documents
    fn count(&self) -> IndexResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_codes_map_to_busy() {
        for code in [ErrorCode::DatabaseBusy, ErrorCode::DatabaseLocked] {
            let failure = rusqlite::ffi::Error {
                code,
                extended_code: 0,
            };
            let error: IndexError = rusqlite::Error::SqliteFailure(failure, None).into();
            assert!(error.is_busy());
        }
    }

    #[test]
    fn test_other_errors_are_not_busy() {
        let error: IndexError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(!error.is_busy());
        assert!(matches!(error, IndexError::Sqlite(_)));
    }
}
