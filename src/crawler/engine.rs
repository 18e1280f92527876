//! Crawl engine - single-server crawl passes
//!
//! A pass starts from a seed, walks the server depth-first, and gives every
//! URL that failed transiently one more chance in a second sweep. What is
//! still unresolved after that is handed to the update daemon through the
//! persisted pending-update list.

use crate::access::{AccessHandle, Priority};
use crate::config::{Config, CrawlerConfig, SiteConfig};
use crate::crawler::batch::BatchBuffer;
use crate::crawler::fetcher::{FetchOutcome, Fetcher, HttpFetcher};
use crate::crawler::politeness::Politeness;
use crate::index::{Document, IndexResult, IndexStore, SqliteIndex, StaleDocument};
use crate::state::{CrawlTask, Frontier, PendingEntry, PendingUpdates, VisitedSet};
use crate::url::{normalize_url, resolve_link, same_server};
use crate::Result;
use chrono::Utc;
use std::time::{Duration, Instant};
use url::Url;

/// Tunables of a crawl pass
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Timeout each pass starts with; half of it is slept before every request
    pub default_timeout: Duration,
    /// Flush the batch once it holds this many documents
    pub batch_size: usize,
    /// Tasks are never enqueued at or beyond this depth
    pub max_depth: u32,
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            batch_size: config.batch_size,
            max_depth: config.max_depth,
        }
    }
}

/// Counters for one or more passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Requests handed to the fetcher
    pub fetched: usize,
    /// Documents added to the batch
    pub indexed: usize,
    /// URLs recorded as not indexable
    pub skipped: usize,
    /// Transient failures moved to the retry list
    pub retried: usize,
    /// URLs left unresolved and stored as pending updates
    pub deferred: usize,
    /// Documents written to the index
    pub flushed: usize,
}

impl PassReport {
    pub fn merge(&mut self, other: &PassReport) {
        self.fetched += other.fetched;
        self.indexed += other.indexed;
        self.skipped += other.skipped;
        self.retried += other.retried;
        self.deferred += other.deferred;
        self.flushed += other.flushed;
    }
}

/// Crawls one server at a time and feeds the index
pub struct CrawlEngine {
    fetcher: Box<dyn Fetcher>,
    store: Box<dyn IndexStore>,
    access: AccessHandle,
    settings: CrawlSettings,
    requester: String,
    visited: VisitedSet,
    pending: PendingUpdates,
    frontier: Frontier,
    retry_later: Frontier,
    batch: BatchBuffer,
    politeness: Politeness,
}

impl CrawlEngine {
    /// Creates an engine from its collaborators
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Source of pages
    /// * `store` - This engine's own connection to the index
    /// * `access` - Handle to the process-wide access coordinator
    /// * `visited` - Persisted list of non-indexable URLs
    /// * `pending` - Persisted carry-over list
    /// * `settings` - Pass tunables
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        store: Box<dyn IndexStore>,
        access: AccessHandle,
        visited: VisitedSet,
        pending: PendingUpdates,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            fetcher,
            store,
            access,
            requester: "crawler".to_string(),
            visited,
            pending,
            frontier: Frontier::new(),
            retry_later: Frontier::new(),
            batch: BatchBuffer::new(settings.batch_size),
            politeness: Politeness::new(settings.default_timeout),
            settings,
        }
    }

    /// Builds an engine for a configured site
    ///
    /// Opens the site's SQLite index, loads its visited and pending files and
    /// creates an HTTP fetcher carrying the configured user agent.
    pub fn for_site(config: &Config, site: &SiteConfig, access: AccessHandle) -> Result<Self> {
        let state_dir = site.state_dir(&config.storage);
        let visited = VisitedSet::load_in(&state_dir)?;
        let pending = PendingUpdates::load_in(&state_dir)?;
        let store = SqliteIndex::open(&site.index_path(&config.storage))?;
        let fetcher = HttpFetcher::new(&config.user_agent, &config.crawler)?;

        tracing::info!(
            "Loaded site '{}': {} visited, {} pending",
            site.name,
            visited.len(),
            pending.len()
        );

        Ok(Self::new(
            Box::new(fetcher),
            Box::new(store),
            access,
            visited,
            pending,
            CrawlSettings::from(&config.crawler),
        )
        .with_requester(format!("crawler:{}", site.name)))
    }

    /// Sets the name this engine uses when requesting index access
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = requester.into();
        self
    }

    /// Runs one pass starting at `start_url`
    ///
    /// Individual page failures never abort the pass. Errors are returned
    /// only when state files or the index cannot be written.
    pub async fn crawl(&mut self, start_url: &str) -> Result<PassReport> {
        let seed = normalize_url(start_url)?;
        self.push_seed(seed)?;
        self.run_pass().await
    }

    /// Runs one isolated pass per seed
    ///
    /// The frontier and the retry list are reset before each seed; visited
    /// and pending state carry over.
    pub async fn crawl_all(&mut self, seeds: &[String]) -> Result<PassReport> {
        let mut total = PassReport::default();
        for seed in seeds {
            self.frontier.clear();
            self.retry_later.clear();

            let report = self.crawl(seed).await?;
            total.merge(&report);
        }
        Ok(total)
    }

    fn push_seed(&mut self, seed: Url) -> Result<()> {
        if self.visited.contains(seed.as_str()) {
            tracing::info!("Seed {} was already found not indexable, skipping", seed);
            return Ok(());
        }

        // A seed that was pending is crawled now instead
        if self.pending.remove(seed.as_str()).is_some() {
            self.pending.save()?;
        }

        self.frontier.push(CrawlTask::seed(seed));
        Ok(())
    }

    /// Runs both sweeps over whatever is in the frontier, then flushes and
    /// persists leftovers
    pub async fn run_pass(&mut self) -> Result<PassReport> {
        let started = Instant::now();
        let mut report = PassReport::default();

        self.sweep(&mut report).await?;

        if !self.retry_later.is_empty() {
            tracing::debug!(
                "Second sweep over {} deferred URLs",
                self.retry_later.len()
            );
            self.frontier.absorb(&mut self.retry_later);
            self.sweep(&mut report).await?;
        }

        report.flushed += self.flush().await?;

        let now = Utc::now();
        let leftovers = self.retry_later.drain();
        if !leftovers.is_empty() {
            for task in leftovers {
                if self.pending.push(PendingEntry::new(task.url.as_str(), now)) {
                    report.deferred += 1;
                }
            }
            self.pending.save()?;
        }

        tracing::info!(
            "Pass finished in {:.1}s: {} fetched, {} indexed, {} skipped, {} deferred",
            started.elapsed().as_secs_f64(),
            report.fetched,
            report.indexed,
            report.skipped,
            report.deferred
        );

        Ok(report)
    }

    async fn sweep(&mut self, report: &mut PassReport) -> Result<()> {
        while let Some(task) = self.frontier.pop() {
            let outcome = self.fetch(&task.url).await;
            report.fetched += 1;

            tracing::debug!(
                url = %task.url,
                depth = task.depth,
                outcome = outcome.label(),
                "Fetched"
            );

            match outcome {
                FetchOutcome::Success(page) => {
                    self.batch.push(Document::new(
                        task.url.as_str(),
                        page.title,
                        page.text,
                        Utc::now(),
                    ));
                    report.indexed += 1;
                    self.enqueue_links(&task, &page.links);
                }
                FetchOutcome::Skip { reason } => {
                    tracing::debug!("Not indexable ({}): {}", reason, task.url);
                    self.visited.insert(task.url.as_str())?;
                    report.skipped += 1;
                }
                FetchOutcome::TransientSlow | FetchOutcome::RateLimited => {
                    if self.retry_later.push(task) {
                        report.retried += 1;
                    }
                }
            }

            if self.batch.is_full() {
                report.flushed += self.flush().await?;
            }

            if report.fetched % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages fetched, {} in frontier, {} to retry",
                    report.fetched,
                    self.frontier.len(),
                    self.retry_later.len()
                );
            }
        }
        Ok(())
    }

    /// Sleeps the politeness delay, then fetches `url`
    ///
    /// Fetcher errors are reported as [`FetchOutcome::Skip`].
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        self.politeness.wait().await;
        match self.fetcher.fetch(url, self.politeness.timeout()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Fetch of {} failed: {}", url, e);
                FetchOutcome::Skip {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Queues the same-server links of `parent`'s page that are not yet known
    ///
    /// # Returns
    ///
    /// Number of tasks added to the frontier
    pub fn enqueue_links(&mut self, parent: &CrawlTask, hrefs: &[String]) -> usize {
        if parent.depth + 1 >= self.settings.max_depth {
            tracing::trace!("Depth cap reached at {}", parent.url);
            return 0;
        }

        let mut added = 0;
        for href in hrefs {
            let Ok(url) = resolve_link(&parent.url, href) else {
                continue;
            };
            if !same_server(&parent.url, &url) || self.is_known(url.as_str()) {
                continue;
            }
            if self.frontier.push(parent.child(url)) {
                added += 1;
            }
        }
        added
    }

    /// True if the URL is waiting, settled, or already indexed
    fn is_known(&self, url: &str) -> bool {
        if self.frontier.contains(url)
            || self.retry_later.contains(url)
            || self.visited.contains(url)
            || self.pending.contains(url)
            || self.batch.contains(url)
        {
            return true;
        }

        // A racy read is fine here: a false negative only costs a duplicate fetch
        match self.store.exists(url) {
            Ok(found) => found,
            Err(e) => {
                tracing::trace!("Existence check for {} failed: {}", url, e);
                false
            }
        }
    }

    /// Writes the batch to the index through the coordinator
    ///
    /// On failure the documents go back into the batch and the error is
    /// returned.
    pub async fn flush(&mut self) -> Result<usize> {
        if self.batch.is_empty() {
            return Ok(0);
        }

        let docs = self.batch.take();
        let store = &mut self.store;
        let result = self
            .access
            .run_exclusive(&self.requester, Priority::CRAWL, || store.add_batch(&docs))
            .await;

        match result {
            Ok(()) => {
                tracing::debug!("Flushed {} documents to the index", docs.len());
                Ok(docs.len())
            }
            Err(e) => {
                tracing::error!("Failed to flush {} documents: {}", docs.len(), e);
                self.batch.restore(docs);
                Err(e.into())
            }
        }
    }

    /// Re-crawls from an already indexed page: its links become depth-1 tasks
    /// of a fresh pass
    pub async fn follow_links(&mut self, url: &Url, hrefs: &[String]) -> Result<PassReport> {
        let parent = CrawlTask::seed(url.clone());
        if self.enqueue_links(&parent, hrefs) == 0 {
            return Ok(PassReport::default());
        }
        self.run_pass().await
    }

    /// Runs `op` against the index while holding exclusive access
    pub async fn with_index<T, F>(&mut self, priority: Priority, mut op: F) -> IndexResult<T>
    where
        F: FnMut(&mut dyn IndexStore) -> IndexResult<T>,
    {
        let store = &mut self.store;
        self.access
            .run_exclusive(&self.requester, priority, || op(&mut **store))
            .await
    }

    /// Stale documents, oldest first, read under exclusive access
    pub async fn find_stale(
        &mut self,
        priority: Priority,
        age_days: u32,
        limit: usize,
    ) -> IndexResult<Vec<StaleDocument>> {
        self.with_index(priority, |store| store.find_stale(age_days, limit))
            .await
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    pub fn visited_mut(&mut self) -> &mut VisitedSet {
        &mut self.visited
    }

    pub fn pending(&self) -> &PendingUpdates {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingUpdates {
        &mut self.pending
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }
}
