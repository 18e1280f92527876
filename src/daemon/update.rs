//! One update run: re-fetch carried-over and stale URLs and apply the decay rules

use crate::access::{AccessHandle, Priority};
use crate::config::{Config, SiteConfig, UpdateConfig};
use crate::crawler::{CrawlEngine, FetchOutcome, PassReport};
use crate::daemon::schedule::Schedule;
use crate::index::Document;
use crate::state::PendingEntry;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

/// Counters of one update run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// URLs taken from the pending list
    pub carried_over: usize,
    /// URLs returned by the stale query
    pub stale: usize,
    /// Documents re-fetched and rewritten
    pub refreshed: usize,
    /// Documents removed from the index
    pub deleted: usize,
    /// URLs put back on the pending list with their original timestamp
    pub deferred: usize,
    /// URLs dropped from all tracking because they failed for too long
    pub forgotten: usize,
    /// URLs found not indexable
    pub skipped: usize,
    /// Passes started from the links of refreshed pages
    pub follow_up: PassReport,
}

/// Keeps a site's index fresh
///
/// The daemon drives its own [`CrawlEngine`], so follow-up passes share the
/// site's visited and pending state with the rest of the run.
pub struct UpdateDaemon {
    engine: CrawlEngine,
    config: UpdateConfig,
}

impl UpdateDaemon {
    pub fn new(engine: CrawlEngine, config: UpdateConfig) -> Self {
        Self { engine, config }
    }

    /// Builds a daemon for a configured site
    pub fn for_site(config: &Config, site: &SiteConfig, access: AccessHandle) -> Result<Self> {
        let engine = CrawlEngine::for_site(config, site, access)?
            .with_requester(format!("update-daemon:{}", site.name));
        Ok(Self::new(engine, config.update.clone()))
    }

    /// Performs one update run
    ///
    /// Up to half of the budget goes to the oldest pending entries, the rest
    /// to stale documents from the index. Failures of single URLs are applied
    /// to the index and state; only storage failures are returned.
    pub async fn run_once(&mut self) -> Result<UpdateReport> {
        let started = Instant::now();
        let mut report = UpdateReport::default();

        let carried = self.engine.pending_mut().take_oldest(self.config.limit / 2);
        if !carried.is_empty() {
            self.engine.pending_mut().save()?;
        }
        report.carried_over = carried.len();

        let remaining = self.config.limit.saturating_sub(carried.len());
        let stale = if remaining > 0 {
            self.engine
                .find_stale(Priority::MAINTENANCE, self.config.stale_age_days, remaining)
                .await?
        } else {
            Vec::new()
        };
        report.stale = stale.len();

        let mut seen = HashSet::new();
        let mut work: Vec<PendingEntry> = carried;
        work.retain(|entry| seen.insert(entry.url.clone()));

        // A stale URL may also sit in the untaken part of the pending list;
        // it leaves the list now and keeps the older of both timestamps
        let mut pending_changed = false;
        for doc in stale {
            if !seen.insert(doc.url.clone()) {
                continue;
            }
            let mut entry = PendingEntry::new(doc.url, doc.last_seen);
            if let Some(row) = self.engine.pending_mut().remove(&entry.url) {
                entry.last_seen = entry.last_seen.min(row.last_seen);
                pending_changed = true;
            }
            work.push(entry);
        }
        if pending_changed {
            self.engine.pending_mut().save()?;
        }

        info!(
            carried_over = report.carried_over,
            stale = report.stale,
            "Update run started with {} URLs",
            work.len()
        );

        for entry in work {
            self.refresh(entry, &mut report).await?;
        }

        self.engine.pending_mut().save()?;

        info!(
            elapsed_s = started.elapsed().as_secs(),
            refreshed = report.refreshed,
            deleted = report.deleted,
            deferred = report.deferred,
            forgotten = report.forgotten,
            skipped = report.skipped,
            follow_up = report.follow_up.indexed,
            "Update run finished"
        );

        Ok(report)
    }

    async fn refresh(&mut self, entry: PendingEntry, report: &mut UpdateReport) -> Result<()> {
        let url = match Url::parse(&entry.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %entry.url, "Dropping unparseable URL: {}", e);
                report.forgotten += 1;
                return Ok(());
            }
        };

        let outcome = self.engine.fetch(&url).await;
        let now = Utc::now();
        debug!(%url, outcome = outcome.label(), age_days = entry.age_days(now), "Re-fetched");

        match outcome {
            FetchOutcome::Success(page) => {
                let doc = Document::new(url.as_str(), page.title, page.text, now);
                self.engine
                    .with_index(Priority::MAINTENANCE, |store| store.update(&doc))
                    .await?;
                report.refreshed += 1;

                let follow_up = self.engine.follow_links(&url, &page.links).await?;
                report.follow_up.merge(&follow_up);
            }
            FetchOutcome::TransientSlow => {
                if older_than(&entry, now, self.config.slow_forget_days) {
                    self.delete(url.as_str(), report).await?;
                    report.forgotten += 1;
                } else {
                    self.defer(entry, report);
                }
            }
            FetchOutcome::RateLimited => {
                self.delete(url.as_str(), report).await?;
                if older_than(&entry, now, self.config.rate_limited_forget_days) {
                    report.forgotten += 1;
                } else {
                    self.defer(entry, report);
                }
            }
            FetchOutcome::Skip { reason } => {
                debug!(%url, %reason, "No longer indexable");
                self.engine.visited_mut().insert(url.as_str())?;
                self.delete(url.as_str(), report).await?;
                report.skipped += 1;
            }
        }

        Ok(())
    }

    async fn delete(&mut self, url: &str, report: &mut UpdateReport) -> Result<()> {
        let removed = self
            .engine
            .with_index(Priority::MAINTENANCE, |store| store.delete(url))
            .await?;
        if removed {
            report.deleted += 1;
        }
        Ok(())
    }

    /// Puts the entry back unchanged so its age keeps counting
    fn defer(&mut self, entry: PendingEntry, report: &mut UpdateReport) {
        if self.engine.pending_mut().push(entry) {
            report.deferred += 1;
        }
    }

    /// Runs according to `schedule`; a daily schedule never returns unless a
    /// run fails
    pub async fn run_scheduled(&mut self, schedule: Schedule) -> Result<()> {
        loop {
            if let Some(next) = schedule.next_run_after(Utc::now()) {
                info!("Next update run at {}", next);
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
            }

            if let Err(e) = self.run_once().await {
                error!("Update run failed: {}", e);
                return Err(e);
            }

            if schedule == Schedule::Once {
                return Ok(());
            }
        }
    }

    pub fn engine(&self) -> &CrawlEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut CrawlEngine {
        &mut self.engine
    }
}

fn older_than(entry: &PendingEntry, now: DateTime<Utc>, days: u32) -> bool {
    now - entry.last_seen > Duration::days(i64::from(days))
}
