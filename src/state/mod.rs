//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlTask`: A URL paired with its depth below the seed
//! - `Frontier`: Depth-first stack of tasks for the current pass
//! - `VisitedSet`: Persisted, append-only list of non-indexable URLs
//! - `PendingUpdates`: Persisted carry-over list consumed by the update daemon

mod frontier;
mod pending;
mod task;
mod visited;

// Re-export main types
pub use frontier::Frontier;
pub use pending::{PendingEntry, PendingUpdates, PENDING_FILE};
pub use task::CrawlTask;
pub use visited::{VisitedSet, VISITED_FILE};
