//! Index access coordination
//!
//! One arbitration task hands out exclusive access to the index, one
//! requester at a time. Requests are served strictly by [`Priority`]
//! (lower first) and, within a priority, in submission order. Grant and
//! release are channel messages, so handing over the baton is immediate.
//!
//! # Example
//!
//! ```no_run
//! use gugel::access::{AccessCoordinator, Priority};
//!
//! # async fn example() -> Result<(), gugel::index::IndexError> {
//! let coordinator = AccessCoordinator::start();
//! let handle = coordinator.handle();
//! let grant = handle.acquire("search", Priority::INTERACTIVE).await?;
//! // ... use the index ...
//! grant.release();
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod wish;

pub use coordinator::{AccessCoordinator, AccessGrant, AccessHandle, STARVATION_WARNING};
pub use wish::Priority;
