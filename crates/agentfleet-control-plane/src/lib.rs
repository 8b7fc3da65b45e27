//! agentfleet Control Plane Library
//!
//! This crate wires the blocker escalation engine and the worker pool
//! orchestrator around a task store, a deferred-callback scheduler and a
//! notification sink, and exposes them over HTTP.

pub mod blockers;
pub mod config;
pub mod http;
pub mod metrics;
pub mod notify;
pub mod pools;
pub mod scheduler;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use blockers::{BlockerMonitor, BlockerResolver, Escalator, ScanReport};
pub use config::Config;
pub use notify::{NotificationSink, TracingSink};
pub use pools::PoolManager;
pub use scheduler::{Callback, CallbackDispatcher, CallbackScheduler, TokioScheduler};
pub use state::AppState;
pub use store::{MemoryStore, PoolStore, TaskStore};
