use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;
use tokio::sync::oneshot;

use crate::access::AccessGrant;

/// Scheduling priority of an access request; lower values are served first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    /// Interactive index reads
    pub const INTERACTIVE: Priority = Priority(0);
    /// Batch flushes of a running crawl pass
    pub const CRAWL: Priority = Priority(2);
    /// Update daemon writes
    pub const MAINTENANCE: Priority = Priority(3);
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending request for exclusive index access
pub(crate) struct AccessWish {
    pub requester: String,
    pub priority: Priority,
    pub submitted_at: Instant,
    pub grant_tx: oneshot::Sender<AccessGrant>,
}

/// A wish as held in the arbitration queue, stamped with its arrival order
pub(crate) struct QueuedWish {
    pub seq: u64,
    pub wish: AccessWish,
}

// Lower priority values pop first from the max-heap; ties go to the
// earlier arrival.
impl Ord for QueuedWish {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .wish
            .priority
            .cmp(&self.wish.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedWish {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedWish {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedWish {}
