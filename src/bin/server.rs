//! Agent server binary.
//!
//! Serves either the financial orchestrator or one of the check agents over
//! A2A, depending on `AGENT_ROLE`.
//!
//! # Environment Variables
//!
//! - `AGENT_ROLE` — `orchestrator` (default), `budget`, `planning` or `legal`
//! - `HOST` / `PORT` — Bind address (default `localhost`, port 10001-10004 by role)
//! - `PUBLIC_URL` — URL published on the agent card
//! - `CONFIG_PATH` — Orchestrator YAML config
//! - `REMOTE_AGENTS`, `DELEGATION_TIMEOUT_SECS`, `UNAVAILABLE_POLICY` — Orchestrator overrides
//! - `BUDGET_FILE` / `EXPENSES_FILE` — Check agent data (default `database/...`)
//! - `RUST_LOG` — Tracing filter (default: "info,expense_a2a=debug")
//!
//! # Usage
//!
//! ```bash
//! AGENT_ROLE=budget cargo run --bin server &
//! AGENT_ROLE=planning cargo run --bin server &
//! AGENT_ROLE=legal cargo run --bin server &
//! cargo run --bin server
//! cargo run --bin client -- "Approve R$ 2.500 for the Marketing department with supplier XYZ Agency"
//! ```

use std::sync::Arc;

use anyhow::Context;
use expense_a2a::a2a::config::A2AServerConfig;
use expense_a2a::checks::{CheckAgent, CheckKind};
use expense_a2a::config::AgentRole;
use expense_a2a::server::{agent_router, serve};
use expense_a2a::tasks::InMemoryTaskStore;
use expense_a2a::{
    AgentExecutor, FinancialOrchestrator, InMemorySessionStore, OrchestratorConfig, ServerSettings, SessionStore,
    TaskManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; `log` records from the library are captured too.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,expense_a2a=debug".into()),
        )
        .init();

    let settings = ServerSettings::from_env()?;
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

    let (config, executor): (A2AServerConfig, Arc<dyn AgentExecutor>) = match settings.role {
        AgentRole::Orchestrator => {
            let mut config = match settings.config_path {
                Some(ref path) => OrchestratorConfig::load(path)?,
                None => OrchestratorConfig::default(),
            };
            config.apply_env(|key| std::env::var(key).ok())?;

            let orchestrator = FinancialOrchestrator::from_config(config, sessions)
                .context("failed to build the HTTP client")?;
            for agent in orchestrator.refresh().await {
                tracing::warn!("{} not available yet ({}): {}", agent.label, agent.url, agent.reason);
            }
            for card in orchestrator.connections().registry().cards() {
                tracing::info!("Connected to {} at {}", card.name, card.url);
            }
            (orchestrator.server_config(settings.public_url.clone()), Arc::new(orchestrator))
        }
        role => {
            let kind = match role {
                AgentRole::Budget => CheckKind::Budget,
                AgentRole::Planning => CheckKind::Planning,
                _ => CheckKind::Legal,
            };
            let agent = CheckAgent::new(
                kind,
                settings.public_url.clone(),
                settings.budget_file.clone(),
                settings.expenses_file.clone(),
            );
            (agent.server_config(), Arc::new(agent.executor(sessions)))
        }
    };

    let manager = TaskManager::new(executor, Arc::new(InMemoryTaskStore::new()));
    let app = agent_router(&config, manager);

    let bind_addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("{} starting on {}", config.name, bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /.well-known/agent-card.json — agent card");
    tracing::info!("  GET  /health                      — liveness probe");
    tracing::info!("  POST {:<30} — JSON-RPC (message/send, message/stream, tasks/get)", config.rpc_path);

    serve(listener, app, shutdown_signal()).await.context("server failed")?;
    tracing::info!("{} stopped", config.name);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
