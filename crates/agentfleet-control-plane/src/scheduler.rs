//! Deferred callbacks - runs pool follow-ups at or after a delay.
//!
//! Callbacks are fire-and-forget. Nothing is ever cancelled; a callback that
//! arrives after its pool moved on hits the idempotent guards in
//! [`PoolManager`] and does nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use agentfleet_core::PoolId;

use crate::pools::PoolManager;

/// Work that can be deferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// Evaluate the merge policy for a pool.
    MergePool(PoolId),
    /// Force-fail a pool that exceeded its time budget.
    PoolTimeout(PoolId),
    /// Archive a finished pool.
    CleanupPool(PoolId),
}

impl Callback {
    pub fn pool_id(&self) -> &PoolId {
        match self {
            Self::MergePool(id) | Self::PoolTimeout(id) | Self::CleanupPool(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MergePool(_) => "merge_pool",
            Self::PoolTimeout(_) => "pool_timeout",
            Self::CleanupPool(_) => "cleanup_pool",
        }
    }
}

/// Accepts `(delay, callback)` and fires the callback at or after `now + delay`.
pub trait CallbackScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, callback: Callback);
}

/// Scheduler backed by tokio timers.
///
/// Each scheduled callback sleeps on its own task and is then handed to a
/// [`CallbackDispatcher`] through an unbounded channel.
#[derive(Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<Callback>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiving end for its dispatcher.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Callback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CallbackScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: Callback) {
        debug!(
            callback = callback.kind(),
            pool_id = %callback.pool_id(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling callback"
        );

        let tx = self.tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if tx.send(callback).is_err() {
                warn!("Callback dispatcher is gone, dropping callback");
            }
        });
    }
}

/// Drains fired callbacks and runs them against the pool manager.
pub struct CallbackDispatcher;

impl CallbackDispatcher {
    /// Run until every sender is dropped. Each callback runs on its own task
    /// so a slow merge never holds up a timeout.
    pub async fn run(mut rx: mpsc::UnboundedReceiver<Callback>, pools: Arc<PoolManager>) {
        info!("Callback dispatcher started");
        while let Some(callback) = rx.recv().await {
            let pools = pools.clone();
            tokio::spawn(async move {
                dispatch_callback(&pools, callback).await;
            });
        }
        info!("Callback dispatcher stopped");
    }
}

/// Run one callback. Errors are logged; there is no caller to return them to.
pub async fn dispatch_callback(pools: &PoolManager, callback: Callback) {
    let kind = callback.kind();
    let pool_id = callback.pool_id().clone();

    let result = match callback {
        Callback::MergePool(id) => pools.merge_results(&id).await.map(|_| ()),
        Callback::PoolTimeout(id) => pools.handle_timeout(&id).await.map(|_| ()),
        Callback::CleanupPool(id) => pools.cleanup_pool(&id, false).await.map(|_| ()),
    };

    if let Err(e) = result {
        warn!(callback = kind, pool_id = %pool_id, error = %e, "Callback failed");
    }
}
