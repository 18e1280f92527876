use crate::{GugelError, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// File name of the pending-update list inside a site's state directory
pub const PENDING_FILE: &str = "urls_to_visit_update.txt";

/// Timestamp format written by older versions of the crawler
const LEGACY_TIMESTAMP_FORMAT: &str = "%y-%m-%d %H:%M:%S";

/// A URL whose fetch is still unresolved, with the time it was last seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub url: String,
    pub last_seen: DateTime<Utc>,
}

impl PendingEntry {
    pub fn new(url: impl Into<String>, last_seen: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            last_seen,
        }
    }

    /// Days elapsed between `last_seen` and `now`
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_seen).num_days()
    }

    fn to_line(&self) -> String {
        format!(
            "{},{}",
            self.url,
            self.last_seen.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    fn parse_line(line: &str) -> Option<Self> {
        let (url, timestamp) = line.rsplit_once(',')?;
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        let last_seen = parse_timestamp(timestamp.trim())?;
        Some(Self::new(url, last_seen))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, LEGACY_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// URLs carried over between runs for the update daemon
///
/// The list is held in memory and fully rewritten by [`PendingUpdates::save`]
/// through a temporary file and a rename, so an interrupted save leaves the
/// previous file intact.
#[derive(Debug)]
pub struct PendingUpdates {
    path: Option<PathBuf>,
    entries: Vec<PendingEntry>,
}

impl PendingUpdates {
    /// Loads the pending list from `path`, starting empty if the file is missing
    ///
    /// Lines that cannot be parsed are skipped with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut updates = Self {
            path: Some(path.clone()),
            entries: Vec::new(),
        };

        if !path.exists() {
            return Ok(updates);
        }

        let content = fs::read_to_string(&path).map_err(|e| GugelError::persistence(&path, e))?;
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match PendingEntry::parse_line(line) {
                Some(entry) => {
                    updates.push(entry);
                }
                None => warn!(
                    path = %path.display(),
                    line = number + 1,
                    "Skipping malformed pending-update line"
                ),
            }
        }

        debug!(path = %path.display(), count = updates.len(), "Loaded pending updates");
        Ok(updates)
    }

    /// Loads `urls_to_visit_update.txt` from a site's state directory
    pub fn load_in(dir: &Path) -> Result<Self> {
        Self::load(dir.join(PENDING_FILE))
    }

    /// A list that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Vec::new(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.iter().any(|entry| entry.url == url)
    }

    /// Adds an entry unless the URL is already pending
    ///
    /// # Returns
    ///
    /// `true` if the entry was added
    pub fn push(&mut self, entry: PendingEntry) -> bool {
        if self.contains(&entry.url) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn remove(&mut self, url: &str) -> Option<PendingEntry> {
        let index = self.entries.iter().position(|entry| entry.url == url)?;
        Some(self.entries.remove(index))
    }

    /// Removes and returns up to `n` entries, oldest `last_seen` first
    pub fn take_oldest(&mut self, n: usize) -> Vec<PendingEntry> {
        self.entries.sort_by_key(|entry| entry.last_seen);
        let n = n.min(self.entries.len());
        self.entries.drain(..n).collect()
    }

    pub fn entries(&self) -> &[PendingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites the pending file with the current entries
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Err(e) = self.write_atomically(path) {
            error!(path = %path.display(), error = %e, "Failed to persist pending updates");
            return Err(GugelError::persistence(path, e));
        }

        debug!(path = %path.display(), count = self.entries.len(), "Saved pending updates");
        Ok(())
    }

    fn write_atomically(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            for entry in &self.entries {
                writeln!(file, "{}", entry.to_line())?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)
    }
}
