//! HTTP surface shared by every agent, the orchestrator included.
//!
//! # Endpoints
//!
//! - `GET  /.well-known/agent-card.json` — Agent card (also served at
//!   `/.well-known/agent-card` and the legacy `/.well-known/agent.json`)
//! - `GET  /health` — Liveness probe
//! - `POST <rpc_path>` — JSON-RPC 2.0: `message/send`, `message/stream`,
//!   `tasks/get`, `tasks/cancel`

pub mod routes;

pub use routes::{agent_router, app_router, serve, AppState};
