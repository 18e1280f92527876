use crate::{GugelError, Result};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// File name of the visited list inside a site's state directory
pub const VISITED_FILE: &str = "urls_visited.txt";

/// URLs that were fetched and found not indexable
///
/// Backed by an append-only file with one URL per line. Entries are never
/// removed, so a dead link is fetched at most once.
#[derive(Debug)]
pub struct VisitedSet {
    path: Option<PathBuf>,
    urls: HashSet<String>,
}

impl VisitedSet {
    /// Loads the visited list from `path`, starting empty if the file is missing
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut urls = HashSet::new();

        if path.exists() {
            let file = fs::File::open(&path).map_err(|e| GugelError::persistence(&path, e))?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| GugelError::persistence(&path, e))?;
                let line = line.trim();
                if !line.is_empty() {
                    urls.insert(line.to_string());
                }
            }
        }

        debug!(path = %path.display(), count = urls.len(), "Loaded visited URLs");

        Ok(Self {
            path: Some(path),
            urls,
        })
    }

    /// Loads `urls_visited.txt` from a site's state directory
    pub fn load_in(dir: &Path) -> Result<Self> {
        Self::load(dir.join(VISITED_FILE))
    }

    /// A set that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            urls: HashSet::new(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Records a URL and appends it to the file immediately
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The URL was new and has been persisted
    /// * `Ok(false)` - The URL was already known
    /// * `Err(GugelError::Persistence)` - The file could not be written
    pub fn insert(&mut self, url: &str) -> Result<bool> {
        if self.urls.contains(url) {
            return Ok(false);
        }

        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, url) {
                error!(path = %path.display(), url, error = %e, "Failed to persist visited URL");
                return Err(GugelError::persistence(path, e));
            }
        }

        self.urls.insert(url.to_string());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let mut visited = VisitedSet::load_in(dir.path()).unwrap();
        assert!(visited.is_empty());

        assert!(visited.insert("https://example.com/dead").unwrap());
        assert!(!visited.insert("https://example.com/dead").unwrap());
        assert!(visited.insert("https://example.com/gone").unwrap());

        let reloaded = VisitedSet::load_in(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("https://example.com/dead"));

        let content = fs::read_to_string(dir.path().join(VISITED_FILE)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_load_creates_parent_on_first_insert() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("Crawler").join("site");
        let mut visited = VisitedSet::load_in(&nested).unwrap();
        visited.insert("https://example.com/x").unwrap();
        assert!(nested.join(VISITED_FILE).exists());
    }

    #[test]
    fn test_insert_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the append fail
        let path = dir.path().join(VISITED_FILE);
        fs::create_dir(&path).unwrap();

        let mut visited = VisitedSet {
            path: Some(path),
            urls: HashSet::new(),
        };
        let result = visited.insert("https://example.com/x");
        assert!(matches!(result, Err(GugelError::Persistence { .. })));
        assert!(!visited.contains("https://example.com/x"));
    }

    #[test]
    fn test_in_memory_never_touches_disk() {
        let mut visited = VisitedSet::in_memory();
        assert!(visited.insert("https://example.com/").unwrap());
        assert!(visited.path().is_none());
    }
}
