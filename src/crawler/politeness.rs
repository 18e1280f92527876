//! Politeness delay and timeout backoff
//!
//! [`Politeness`] is the per-pass timeout a crawl starts each request with;
//! the pass sleeps half of it before every request. [`Backoff`] is the
//! fetch adapter's escalation policy for slow servers.

use crate::config::CrawlerConfig;
use std::time::Duration;
use tracing::trace;

/// Request timeout every fetch starts from and the fixed delay derived from it
///
/// The value is seeded from configuration and never changes; escalation for
/// a slow server happens inside the fetcher and ends with the request.
#[derive(Debug, Clone, Copy)]
pub struct Politeness {
    timeout: Duration,
}

impl Politeness {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Timeout handed to the fetcher for the next request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Delay before each request: half the current timeout
    pub fn delay(&self) -> Duration {
        self.timeout / 2
    }

    /// Sleeps for [`Politeness::delay`]
    pub async fn wait(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            trace!(delay_ms = delay.as_millis() as u64, "Politeness delay");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Timeout escalation for a server that keeps timing out
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub step: Duration,
    pub ceiling: Duration,
    pub max_attempts: u32,
}

impl Backoff {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            step: config.timeout_step(),
            ceiling: config.timeout_ceiling(),
            max_attempts: config.max_fetch_attempts,
        }
    }

    /// Timeout for the next attempt after `attempts` timed-out attempts at `current`
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - Retry with this timeout
    /// * `None` - The server is too slow; give up
    pub fn next_timeout(&self, current: Duration, attempts: u32) -> Option<Duration> {
        if current > self.ceiling || attempts >= self.max_attempts {
            return None;
        }
        Some(current + self.step)
    }
}
