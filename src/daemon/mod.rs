//! Update daemon
//!
//! Re-fetches URLs whose state is uncertain: entries a crawl pass could not
//! resolve and documents that have not been observed for a while. Pages that
//! keep failing decay out of the index instead of being retried forever.

mod schedule;
mod update;

pub use schedule::Schedule;
pub use update::{UpdateDaemon, UpdateReport};
