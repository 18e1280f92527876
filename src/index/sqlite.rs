//! SQLite index implementation
//!
//! Each component opens its own [`SqliteIndex`]. The busy timeout is zero,
//! so a write that collides with another connection fails immediately with
//! [`IndexError::Busy`] instead of blocking inside SQLite.

use crate::index::schema::initialize_schema;
use crate::index::traits::{Document, IndexResult, IndexStore, StaleDocument};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite index backend
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    /// Opens (or creates) the index at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; parent directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteIndex)` - Successfully opened/created database
    /// * `Err(IndexError)` - Failed to open database
    pub fn open(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::ZERO)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory index (for testing)
    pub fn new_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn to_timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        url: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        observed_at: to_timestamp(row.get(3)?),
    })
}

const UPSERT_SQL: &str =
    "INSERT OR REPLACE INTO documents (url, title, content, observed_at) VALUES (?1, ?2, ?3, ?4)";

impl IndexStore for SqliteIndex {
    fn add(&mut self, doc: &Document) -> IndexResult<()> {
        self.conn.execute(
            UPSERT_SQL,
            params![doc.url, doc.title, doc.content, doc.observed_at.timestamp()],
        )?;
        Ok(())
    }

    fn add_batch(&mut self, docs: &[Document]) -> IndexResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_SQL)?;
            for doc in docs {
                stmt.execute(params![
                    doc.url,
                    doc.title,
                    doc.content,
                    doc.observed_at.timestamp()
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn update(&mut self, doc: &Document) -> IndexResult<()> {
        let tx = self.conn.transaction()?;
        // A missing row is fine: update inserts when absent
        tx.execute("DELETE FROM documents WHERE url = ?1", params![doc.url])?;
        tx.execute(
            UPSERT_SQL,
            params![doc.url, doc.title, doc.content, doc.observed_at.timestamp()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&mut self, url: &str) -> IndexResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM documents WHERE url = ?1", params![url])?;
        Ok(removed > 0)
    }

    fn exists(&self, url: &str) -> IndexResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM documents WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn find_stale(&self, age_days: u32, limit: usize) -> IndexResult<Vec<StaleDocument>> {
        let cutoff = (Utc::now() - Duration::days(i64::from(age_days))).timestamp();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare(
            "SELECT url, observed_at FROM documents
             WHERE observed_at <= ?1
             ORDER BY observed_at ASC, url ASC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![cutoff, limit], |row| {
            Ok(StaleDocument {
                url: row.get(0)?,
                last_seen: to_timestamp(row.get(1)?),
            })
        })?;

        let mut stale = Vec::new();
        for row in rows {
            stale.push(row?);
        }
        Ok(stale)
    }

    fn get(&self, url: &str) -> IndexResult<Option<Document>> {
        let doc = self
            .conn
            .query_row(
                "SELECT url, title, content, observed_at FROM documents WHERE url = ?1",
                params![url],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    fn count(&self) -> IndexResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
