//! agentfleet Control Plane Server

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentfleet_control_plane::blockers::run_scan_loop;
use agentfleet_control_plane::http;
use agentfleet_control_plane::{
    AppState, CallbackDispatcher, Config, MemoryStore, TaskStore, TracingSink,
};
use agentfleet_core::AgentRecord;

#[derive(Parser, Debug)]
#[command(name = "agentfleet-control-plane")]
#[command(about = "Blocker escalation and worker pool orchestration for an agent fleet")]
#[command(version)]
struct Args {
    /// HTTP bind address
    #[arg(long, env = "AGENTFLEET_HTTP_ADDR", default_value = "[::1]:50052")]
    http_addr: String,

    /// Blocker scan period in seconds
    #[arg(long, env = "AGENTFLEET_SCAN_INTERVAL", default_value = "300")]
    scan_interval: u64,

    /// Longest a scan pass may run, in seconds
    #[arg(long, env = "AGENTFLEET_SCAN_BUDGET", default_value = "60")]
    scan_budget: u64,

    /// Delay before a settled pool is archived, in seconds
    #[arg(long, env = "AGENTFLEET_CLEANUP_GRACE", default_value = "60")]
    cleanup_grace: u64,

    /// Agent that receives tier 3 and tier 4 escalations
    #[arg(long, env = "AGENTFLEET_SENIOR_RESPONDER", default_value = "max")]
    senior_responder: String,

    /// Known agent, as `name` or `name:role`. Repeatable.
    #[arg(long = "agent", value_name = "NAME[:ROLE]")]
    agents: Vec<String>,
}

impl Args {
    fn into_config(self) -> Config {
        let agents = self
            .agents
            .iter()
            .map(|spec| match spec.split_once(':') {
                Some((name, role)) => AgentRecord::new(name.trim()).with_role(role.trim()),
                None => AgentRecord::new(spec.trim()),
            })
            .collect();

        Config {
            http_bind_addr: self.http_addr,
            scan_interval_secs: self.scan_interval,
            scan_budget_secs: self.scan_budget,
            cleanup_grace_secs: self.cleanup_grace,
            senior_responder: self.senior_responder,
            agents,
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = Args::parse().into_config();
    let http_addr: SocketAddr = config.http_bind_addr.parse()?;

    // Seed the agent directory
    let store = Arc::new(MemoryStore::new());
    for agent in &config.agents {
        store.insert_agent(agent.clone()).await?;
    }

    let scan_interval = config.scan_interval();
    let scan_budget = config.scan_budget();
    let agent_count = config.agents.len();

    // Create shared state
    let (state, callbacks) = AppState::new(config, store, Arc::new(TracingSink));

    info!(
        http_addr = %http_addr,
        agents = agent_count,
        scan_interval_secs = scan_interval.as_secs(),
        "Starting agentfleet control plane"
    );

    // Background loops
    tokio::spawn(CallbackDispatcher::run(callbacks, state.pools.clone()));
    tokio::spawn(run_scan_loop(state.blockers.clone(), scan_interval, scan_budget));

    // Start HTTP server
    let router = http::create_router(state);
    let listener = TcpListener::bind(http_addr).await?;
    info!("HTTP server listening on {}", http_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
