use crate::ConfigError;
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Gugel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Looks up a site by name
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| site.name == name)
    }
}

/// Crawl pass behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Request timeout a pass starts with; the pass sleeps half of it between requests
    #[serde(rename = "default-timeout-ms", default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// How much the fetcher adds to the timeout after a timed-out attempt
    #[serde(rename = "timeout-step-ms", default = "default_timeout_step_ms")]
    pub timeout_step_ms: u64,

    /// Once the timeout grows beyond this the server counts as too slow
    #[serde(rename = "timeout-ceiling-ms", default = "default_timeout_ceiling_ms")]
    pub timeout_ceiling_ms: u64,

    /// Hard bound on attempts per fetch
    #[serde(rename = "max-fetch-attempts", default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,

    /// Number of documents buffered before they are written to the index
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Tasks at or beyond this depth are never enqueued
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,
}

impl CrawlerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn timeout_step(&self) -> Duration {
        Duration::from_millis(self.timeout_step_ms)
    }

    pub fn timeout_ceiling(&self) -> Duration {
        Duration::from_millis(self.timeout_ceiling_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            timeout_step_ms: default_timeout_step_ms(),
            timeout_ceiling_ms: default_timeout_ceiling_ms(),
            max_fetch_attempts: default_max_fetch_attempts(),
            batch_size: default_batch_size(),
            max_depth: default_max_depth(),
        }
    }
}

/// Update daemon behavior
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfig {
    /// Number of URLs a single run may re-fetch
    #[serde(default = "default_update_limit")]
    pub limit: usize,

    /// Documents older than this are candidates for re-fetching
    #[serde(rename = "stale-age-days", default = "default_stale_age_days")]
    pub stale_age_days: u32,

    /// Slow pages last seen longer ago than this are dropped from the index
    #[serde(rename = "slow-forget-days", default = "default_slow_forget_days")]
    pub slow_forget_days: u32,

    /// Rate-limited pages last seen longer ago than this are forgotten
    #[serde(
        rename = "rate-limited-forget-days",
        default = "default_rate_limited_forget_days"
    )]
    pub rate_limited_forget_days: u32,

    /// Time of day (UTC, "HH:MM") the scheduled daemon runs
    #[serde(rename = "run-at", default = "default_run_at")]
    pub run_at: String,
}

impl UpdateConfig {
    /// Parses `run-at` into a time of day
    pub fn run_at_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M").map_err(|e| {
            ConfigError::Validation(format!("run-at must be HH:MM, got '{}': {}", self.run_at, e))
        })
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            limit: default_update_limit(),
            stale_age_days: default_stale_age_days(),
            slow_forget_days: default_slow_forget_days(),
            rate_limited_forget_days: default_rate_limited_forget_days(),
            run_at: default_run_at(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the identifying header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Where persisted crawl state and indexes live
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "crawler-dir", default = "default_crawler_dir")]
    pub crawler_dir: PathBuf,

    #[serde(rename = "index-dir", default = "default_index_dir")]
    pub index_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            crawler_dir: default_crawler_dir(),
            index_dir: default_index_dir(),
        }
    }
}

/// One crawled server
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: String,

    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Directory name under the crawler and index directories
    pub path: String,

    /// Additional seeds crawled after the start URL by `crawl_all`
    #[serde(default)]
    pub seeds: Vec<String>,
}

impl SiteConfig {
    /// The start URL followed by any extra seeds
    pub fn all_seeds(&self) -> Vec<String> {
        std::iter::once(self.start_url.clone())
            .chain(self.seeds.iter().cloned())
            .collect()
    }

    /// Directory holding the visited and pending-update files
    pub fn state_dir(&self, storage: &StorageConfig) -> PathBuf {
        storage.crawler_dir.join(&self.path)
    }

    /// Path of the SQLite index file
    pub fn index_path(&self, storage: &StorageConfig) -> PathBuf {
        storage.index_dir.join(&self.path).join("index.sqlite3")
    }
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_timeout_step_ms() -> u64 {
    1_000
}

fn default_timeout_ceiling_ms() -> u64 {
    20_000
}

fn default_max_fetch_attempts() -> u32 {
    25
}

fn default_batch_size() -> usize {
    20
}

fn default_max_depth() -> u32 {
    100
}

fn default_update_limit() -> usize {
    2_000
}

fn default_stale_age_days() -> u32 {
    30
}

fn default_slow_forget_days() -> u32 {
    183
}

fn default_rate_limited_forget_days() -> u32 {
    365
}

fn default_run_at() -> String {
    "01:00".to_string()
}

fn default_crawler_dir() -> PathBuf {
    PathBuf::from("Crawler")
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("Index")
}
