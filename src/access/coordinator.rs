//! Arbitration task and the handles used to talk to it

use crate::access::wish::{AccessWish, Priority, QueuedWish};
use crate::index::{IndexError, IndexResult};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Waits longer than this are reported as possible starvation
pub const STARVATION_WARNING: Duration = Duration::from_secs(30);

/// Exclusive right to use the index
///
/// The baton is handed back when the grant is released or dropped, so an
/// early return or a panic inside the critical section cannot leave the
/// coordinator stuck.
#[derive(Debug)]
pub struct AccessGrant {
    requester: String,
    priority: Priority,
    release_tx: Option<oneshot::Sender<()>>,
}

impl AccessGrant {
    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Hands the baton back to the coordinator
    pub fn release(self) {}
}

impl Drop for AccessGrant {
    fn drop(&mut self) {
        if let Some(tx) = self.release_tx.take() {
            let _ = tx.send(());
            trace!(requester = %self.requester, "Released index access");
        }
    }
}

/// Owner of the arbitration task
///
/// Construct one per process with [`AccessCoordinator::start`] and pass
/// [`AccessHandle`]s to every component that touches the index.
pub struct AccessCoordinator {
    handle: AccessHandle,
    worker: JoinHandle<()>,
}

impl AccessCoordinator {
    /// Spawns the arbitration task on the current tokio runtime
    pub fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(arbitrate(rx));
        debug!("Index access coordinator started");
        Self {
            handle: AccessHandle { tx },
            worker,
        }
    }

    pub fn handle(&self) -> AccessHandle {
        self.handle.clone()
    }

    /// Stops the arbitration task
    ///
    /// Waiting requesters receive [`IndexError::CoordinatorClosed`].
    pub fn shutdown(self) {
        self.worker.abort();
        debug!("Index access coordinator stopped");
    }
}

/// Cloneable entry point for requesting index access
#[derive(Clone, Debug)]
pub struct AccessHandle {
    tx: mpsc::UnboundedSender<AccessWish>,
}

impl AccessHandle {
    /// Queues a wish and returns the receiver its grant will arrive on
    fn submit(
        &self,
        requester: &str,
        priority: Priority,
    ) -> IndexResult<oneshot::Receiver<AccessGrant>> {
        let (grant_tx, grant_rx) = oneshot::channel();
        let wish = AccessWish {
            requester: requester.to_string(),
            priority,
            submitted_at: Instant::now(),
            grant_tx,
        };
        self.tx
            .send(wish)
            .map_err(|_| IndexError::CoordinatorClosed)?;
        trace!(requester, %priority, "Submitted index access wish");
        Ok(grant_rx)
    }

    /// Waits for exclusive index access
    ///
    /// # Arguments
    ///
    /// * `requester` - Name used in log messages
    /// * `priority` - Lower values are served first
    ///
    /// # Returns
    ///
    /// * `Ok(AccessGrant)` - Access is held until the grant is dropped
    /// * `Err(IndexError::CoordinatorClosed)` - The coordinator has stopped
    pub async fn acquire(&self, requester: &str, priority: Priority) -> IndexResult<AccessGrant> {
        let mut grant_rx = self.submit(requester, priority)?;

        match tokio::time::timeout(STARVATION_WARNING, &mut grant_rx).await {
            Ok(grant) => grant.map_err(|_| IndexError::CoordinatorClosed),
            Err(_) => {
                warn!(
                    requester,
                    %priority,
                    waited_secs = STARVATION_WARNING.as_secs(),
                    "Still waiting for index access"
                );
                grant_rx.await.map_err(|_| IndexError::CoordinatorClosed)
            }
        }
    }

    /// Blocking variant of [`AccessHandle::acquire`] for threads outside the runtime
    ///
    /// Must not be called from within an async context.
    pub fn acquire_blocking(&self, requester: &str, priority: Priority) -> IndexResult<AccessGrant> {
        self.submit(requester, priority)?
            .blocking_recv()
            .map_err(|_| IndexError::CoordinatorClosed)
    }

    /// Runs `op` while holding exclusive access
    ///
    /// If the store still reports [`IndexError::Busy`] (another process holds
    /// its file lock), the grant is released and a fresh wish is submitted.
    /// This repeats until `op` succeeds or fails with a different error.
    pub async fn run_exclusive<T, F>(
        &self,
        requester: &str,
        priority: Priority,
        mut op: F,
    ) -> IndexResult<T>
    where
        F: FnMut() -> IndexResult<T>,
    {
        let mut retries: u64 = 0;
        loop {
            let grant = self.acquire(requester, priority).await?;
            match op() {
                Err(IndexError::Busy) => {
                    drop(grant);
                    retries += 1;
                    debug!(requester, retries, "Index busy despite grant, resubmitting");
                }
                result => {
                    grant.release();
                    return result;
                }
            }
        }
    }

    /// Blocking variant of [`AccessHandle::run_exclusive`]
    pub fn run_exclusive_blocking<T, F>(
        &self,
        requester: &str,
        priority: Priority,
        mut op: F,
    ) -> IndexResult<T>
    where
        F: FnMut() -> IndexResult<T>,
    {
        let mut retries: u64 = 0;
        loop {
            let grant = self.acquire_blocking(requester, priority)?;
            match op() {
                Err(IndexError::Busy) => {
                    drop(grant);
                    retries += 1;
                    debug!(requester, retries, "Index busy despite grant, resubmitting");
                }
                result => {
                    grant.release();
                    return result;
                }
            }
        }
    }
}

/// Hands out the baton one wish at a time
///
/// Everything submitted while the previous holder worked is queued before
/// the next pop, so priority decides among all waiting wishes.
async fn arbitrate(mut rx: mpsc::UnboundedReceiver<AccessWish>) {
    let mut queue: BinaryHeap<QueuedWish> = BinaryHeap::new();
    let mut next_seq: u64 = 0;

    loop {
        if queue.is_empty() {
            match rx.recv().await {
                Some(wish) => {
                    queue.push(QueuedWish { seq: next_seq, wish });
                    next_seq += 1;
                }
                None => break,
            }
        }

        while let Ok(wish) = rx.try_recv() {
            queue.push(QueuedWish { seq: next_seq, wish });
            next_seq += 1;
        }

        let Some(QueuedWish { wish, .. }) = queue.pop() else {
            continue;
        };

        let waited = wish.submitted_at.elapsed();
        if waited > STARVATION_WARNING {
            warn!(
                requester = %wish.requester,
                priority = %wish.priority,
                waited_secs = waited.as_secs(),
                "Index access granted after a long wait"
            );
        }

        let (release_tx, release_rx) = oneshot::channel();
        let grant = AccessGrant {
            requester: wish.requester.clone(),
            priority: wish.priority,
            release_tx: Some(release_tx),
        };

        if wish.grant_tx.send(grant).is_err() {
            trace!(requester = %wish.requester, "Requester gone before grant");
            continue;
        }

        trace!(requester = %wish.requester, priority = %wish.priority, "Granted index access");
        // Resolves on release, on drop, and if the holder's task is torn down
        let _ = release_rx.await;
    }

    debug!("All access handles dropped, arbitration finished");
}
