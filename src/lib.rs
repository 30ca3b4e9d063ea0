//! # expense-a2a
//!
//! Expense approval over the A2A protocol: a financial orchestrator fans a
//! request out to independently deployed check agents (budget, planning,
//! legal), tracks each delegated task to its terminal state and combines the
//! votes into one audited decision.
//!
//! Every agent, the orchestrator included, is served by the same HTTP
//! surface ([`server`]) around a [`tasks::TaskManager`] that owns the task
//! lifecycle.

pub mod a2a;
pub mod checks;
pub mod config;
pub mod connection;
pub mod error;
pub mod orchestrator;
pub mod reasoning;
pub mod registry;
pub mod server;
pub mod sessions;
pub mod tasks;

pub use config::{OrchestratorConfig, RemoteAgent, ServerSettings, UnavailablePolicy};
pub use connection::{ConnectionTable, RemoteAgentConnection};
pub use error::OrchestrationError;
pub use orchestrator::{AggregatedDecision, Decision, FinancialOrchestrator, Verdict};
pub use registry::{AgentCardRegistry, Resolution};
pub use sessions::{InMemorySessionStore, SessionStore};
pub use tasks::{AgentExecutor, TaskManager};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
