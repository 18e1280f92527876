//! Per-site statistics
//!
//! Gathers the size of a site's index and crawl state for the `stats`
//! command. Index reads go through the access coordinator at interactive
//! priority so they never collide with a running crawl or update.

use crate::access::{AccessHandle, Priority};
use crate::config::{Config, SiteConfig};
use crate::index::{IndexStore, SqliteIndex};
use crate::state::{PendingUpdates, VisitedSet};
use crate::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Statistics summary of one site
#[derive(Debug, Clone)]
pub struct SiteStatistics {
    pub site: String,

    /// Location of the site's index
    pub index_path: PathBuf,

    /// Documents in the index
    pub indexed: usize,

    /// Stale documents the next update run would pick up
    pub due_for_update: usize,

    /// URLs known to be not indexable
    pub visited: usize,

    /// Unresolved URLs carried over to the update daemon
    pub pending: usize,

    /// Timestamp of the oldest pending entry
    pub oldest_pending: Option<DateTime<Utc>>,
}

/// Loads statistics for one site
///
/// A site that was never crawled reports zeros; its index is not created.
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `site` - The site to inspect
/// * `access` - Handle to the access coordinator
pub async fn load_statistics(
    config: &Config,
    site: &SiteConfig,
    access: &AccessHandle,
) -> Result<SiteStatistics> {
    let state_dir = site.state_dir(&config.storage);
    let visited = VisitedSet::load_in(&state_dir)?;
    let pending = PendingUpdates::load_in(&state_dir)?;
    let index_path = site.index_path(&config.storage);

    let (indexed, due_for_update) = if index_path.exists() {
        let store = SqliteIndex::open(&index_path)?;
        let requester = format!("stats:{}", site.name);
        access
            .run_exclusive(&requester, Priority::INTERACTIVE, || {
                let stale = store.find_stale(config.update.stale_age_days, config.update.limit)?;
                Ok((store.count()?, stale.len()))
            })
            .await?
    } else {
        (0, 0)
    };

    Ok(SiteStatistics {
        site: site.name.clone(),
        index_path,
        indexed,
        due_for_update,
        visited: visited.len(),
        pending: pending.len(),
        oldest_pending: pending.entries().iter().map(|e| e.last_seen).min(),
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &SiteStatistics) {
    println!("=== Site Statistics: {} ===\n", stats.site);

    println!("Index:");
    println!("  Path: {}", stats.index_path.display());
    println!("  Documents: {}", stats.indexed);
    println!("  Due for update: {}", stats.due_for_update);
    println!();

    println!("Crawl State:");
    println!("  Not indexable: {}", stats.visited);
    println!("  Pending updates: {}", stats.pending);
    if let Some(oldest) = stats.oldest_pending {
        let age = (Utc::now() - oldest).num_days();
        println!("  Oldest pending: {} ({} days ago)", oldest.format("%Y-%m-%d %H:%M"), age);
    }
    println!();
}
