//! Shared application state.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::blockers::{BlockerMonitor, Escalator};
use crate::config::Config;
use crate::notify::NotificationSink;
use crate::pools::PoolManager;
use crate::scheduler::{Callback, CallbackScheduler, TokioScheduler};
use crate::store::MemoryStore;

/// Shared application state.
pub struct AppState {
    /// System of record.
    pub store: Arc<MemoryStore>,

    /// Worker pool orchestration.
    pub pools: Arc<PoolManager>,

    /// Blocker scan, propagation and queries.
    pub blockers: Arc<BlockerMonitor>,

    pub config: Config,
}

impl AppState {
    /// Wire the engines around `store`.
    ///
    /// Returns the receiver for fired callbacks; the caller runs a
    /// [`CallbackDispatcher`](crate::scheduler::CallbackDispatcher) on it.
    pub fn new(
        config: Config,
        store: Arc<MemoryStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Callback>) {
        let (scheduler, rx) = TokioScheduler::new();
        let state = Self::with_scheduler(config, store, sink, Arc::new(scheduler));
        (state, rx)
    }

    /// Wire the engines with a caller-supplied scheduler.
    pub fn with_scheduler(
        config: Config,
        store: Arc<MemoryStore>,
        sink: Arc<dyn NotificationSink>,
        scheduler: Arc<dyn CallbackScheduler>,
    ) -> Arc<Self> {
        let escalator = Escalator::new(
            sink,
            config.notification_sender.clone(),
            config.senior_responder.clone(),
        );
        let blockers = Arc::new(BlockerMonitor::new(store.clone(), escalator));
        let pools = Arc::new(
            PoolManager::new(store.clone(), store.clone(), scheduler, config.cleanup_grace())
                .with_failure_propagation(blockers.clone()),
        );

        Arc::new(Self {
            store,
            pools,
            blockers,
            config,
        })
    }
}
