//! Error taxonomy for delegation, task execution and request handling.

use thiserror::Error;

use crate::a2a::{A2AError, A2AErrorCode, TaskState};

/// Errors raised while orchestrating remote agents or running a task.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestrationError {
    /// The agent card could not be resolved. The agent sits this round out.
    #[error("agent at {url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    /// The agent answered, but not with a successfully completed task.
    #[error("agent {agent} returned a malformed response: {reason}")]
    MalformedResponse { agent: String, reason: String },

    /// No terminal result arrived within the delegation timeout.
    #[error("agent {agent} did not answer within {timeout_ms} ms")]
    DelegationTimeout { agent: String, timeout_ms: u64 },

    /// The wrapped business computation failed.
    #[error("{message}")]
    ComputationFailure { message: String },

    /// The inbound request is missing required identifiers or content.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The task already reached a terminal state; tasks are single-shot.
    #[error("task {task_id} is already completed")]
    TaskAlreadyCompleted { task_id: String },

    /// No task with this ID is tracked.
    #[error("task {task_id} not found")]
    TaskNotFound { task_id: String },

    /// The operation exists in the protocol but is not implemented here.
    #[error("{operation} is not supported")]
    Unsupported { operation: String },

    /// An event was emitted out of lifecycle order, e.g. after a terminal state.
    #[error("task {task_id} cannot move from {from} to {to}")]
    IllegalTransition { task_id: String, from: TaskState, to: TaskState },
}

impl OrchestrationError {
    pub fn computation(message: impl Into<String>) -> Self {
        Self::ComputationFailure { message: message.into() }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    /// Whether this error only means "this agent did not vote".
    pub fn is_unavailability(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::MalformedResponse { .. } | Self::DelegationTimeout { .. }
        )
    }
}

impl From<&OrchestrationError> for A2AError {
    fn from(err: &OrchestrationError) -> Self {
        let code = match err {
            OrchestrationError::Unreachable { .. } => A2AErrorCode::InternalError,
            OrchestrationError::MalformedResponse { .. } => A2AErrorCode::InvalidAgentResponse,
            OrchestrationError::DelegationTimeout { .. } => A2AErrorCode::TaskTimeout,
            OrchestrationError::ComputationFailure { .. } => A2AErrorCode::InternalError,
            OrchestrationError::InvalidRequest { .. } => A2AErrorCode::InvalidParams,
            OrchestrationError::TaskAlreadyCompleted { .. } => A2AErrorCode::TaskAlreadyCompleted,
            OrchestrationError::TaskNotFound { .. } => A2AErrorCode::TaskNotFound,
            OrchestrationError::Unsupported { .. } => A2AErrorCode::UnsupportedOperation,
            OrchestrationError::IllegalTransition { .. } => A2AErrorCode::InternalError,
        };
        A2AError::new(code, err.to_string())
    }
}

impl From<OrchestrationError> for A2AError {
    fn from(err: OrchestrationError) -> Self {
        A2AError::from(&err)
    }
}
