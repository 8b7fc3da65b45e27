//! Control plane configuration.

use std::time::Duration;

use agentfleet_core::AgentRecord;

/// Control plane configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub http_bind_addr: String,

    /// Period of the blocker scan (seconds).
    pub scan_interval_secs: u64,

    /// Longest a single scan pass may run before it is abandoned (seconds).
    pub scan_budget_secs: u64,

    /// Delay between a pool settling and its archival (seconds).
    pub cleanup_grace_secs: u64,

    /// Agent that receives tier 3 and tier 4 escalations.
    pub senior_responder: String,

    /// Sender name on system notifications.
    pub notification_sender: String,

    /// Agents known at startup.
    pub agents: Vec<AgentRecord>,
}

impl Config {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn scan_budget(&self) -> Duration {
        Duration::from_secs(self.scan_budget_secs)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind_addr: "[::1]:50052".to_string(),
            scan_interval_secs: 300,
            scan_budget_secs: 60,
            cleanup_grace_secs: 60,
            senior_responder: "max".to_string(),
            notification_sender: "system".to_string(),
            agents: Vec::new(),
        }
    }
}
