//! A2A (Agent-to-Agent) protocol module.
//!
//! Provides the wire types, JSON-RPC envelopes, error codes, client and
//! configuration used both to call remote agents and to serve as one.

pub mod client;
pub mod config;
pub mod errors;
pub mod jsonrpc;
pub mod types;

pub use client::{A2AClient, A2AClientError};
pub use errors::{A2AError, A2AErrorCode};
pub use types::{
    parts_text, AgentCard, AgentSkill, Artifact, Message, Part, Role, Task, TaskEvent, TaskState,
    TaskStatus,
};
