//! Index module: the on-disk document store shared by crawler, daemon and readers
//!
//! Writes and locked reads go through the [`crate::access`] coordinator;
//! plain existence checks may bypass it.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteIndex;
pub use traits::{Document, IndexError, IndexResult, IndexStore, StaleDocument};
