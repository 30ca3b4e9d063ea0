//! The computation a task manager runs for each task.

use async_trait::async_trait;

use crate::a2a::{Message, Task};
use crate::error::OrchestrationError;

use super::updater::TaskUpdater;

/// Everything an executor knows about the request it serves.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub task_id: String,
    pub context_id: String,
    /// The inbound message, tagged with the task and context IDs.
    pub message: Message,
    /// Snapshot of the task as stored when execution started.
    pub existing_task: Option<Task>,
}

impl RequestContext {
    /// Text of the inbound message.
    pub fn user_input(&self) -> String {
        self.message.text()
    }
}

/// Agent logic behind a task manager.
///
/// `execute` drives the task through `updater`. Returning an error before a
/// terminal event lets the manager fail the task on the executor's behalf.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, context: RequestContext, updater: &TaskUpdater) -> Result<(), OrchestrationError>;

    /// Cancel a running task.
    async fn cancel(&self, task: &Task) -> Result<(), OrchestrationError> {
        log::debug!("Cancel requested for task {}", task.id);
        Err(OrchestrationError::Unsupported {
            operation: "tasks/cancel".to_string(),
        })
    }
}
