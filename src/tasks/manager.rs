//! Request handler around the task lifecycle.
//!
//! The manager validates an inbound message, creates the task, runs the
//! executor in the background and applies every emitted event to the stored
//! task before forwarding it to the caller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::a2a::jsonrpc::{MessageSendParams, TaskQueryParams};
use crate::a2a::{Task, TaskEvent};
use crate::error::OrchestrationError;

use super::executor::{AgentExecutor, RequestContext};
use super::store::TaskStore;
use super::updater::TaskUpdater;

/// Failure text for executors that end without completing or failing.
pub const NO_FINAL_ANSWER: &str = "agent finished without a final answer";

/// Runs an [`AgentExecutor`] for each inbound message.
#[derive(Clone)]
pub struct TaskManager {
    executor: Arc<dyn AgentExecutor>,
    store: Arc<dyn TaskStore>,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager").field("store", &self.store).finish_non_exhaustive()
    }
}

impl TaskManager {
    pub fn new(executor: Arc<dyn AgentExecutor>, store: Arc<dyn TaskStore>) -> Self {
        Self { executor, store }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// `message/send`: run the task to its terminal state and return it.
    ///
    /// Executor errors do not surface as `Err`: the caller gets `Ok(task)`
    /// with state `failed` and the error text as its status message.
    pub async fn on_message_send(&self, params: MessageSendParams) -> Result<Task, OrchestrationError> {
        let (task_id, context_id, rx) = self.start(params).await?;
        let mut events = UnboundedReceiverStream::new(rx);
        while events.next().await.is_some() {}
        self.store
            .get(Some(&context_id), &task_id)
            .await
            .ok_or(OrchestrationError::TaskNotFound { task_id })
    }

    /// `message/stream`: the task's events in emission order, ending after
    /// the terminal event.
    pub async fn on_message_stream(
        &self,
        params: MessageSendParams,
    ) -> Result<UnboundedReceiverStream<TaskEvent>, OrchestrationError> {
        let (_, _, rx) = self.start(params).await?;
        Ok(UnboundedReceiverStream::new(rx))
    }

    /// `tasks/get`.
    pub async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task, OrchestrationError> {
        self.store
            .get(params.context_id.as_deref(), &params.id)
            .await
            .ok_or(OrchestrationError::TaskNotFound { task_id: params.id })
    }

    /// `tasks/cancel`.
    pub async fn on_cancel_task(&self, params: TaskQueryParams) -> Result<Task, OrchestrationError> {
        let task = self.on_get_task(params).await?;
        self.executor.cancel(&task).await?;
        self.store
            .get(Some(&task.context_id), &task.id)
            .await
            .ok_or(OrchestrationError::TaskNotFound { task_id: task.id })
    }

    async fn start(
        &self,
        params: MessageSendParams,
    ) -> Result<(String, String, mpsc::UnboundedReceiver<TaskEvent>), OrchestrationError> {
        let mut message = params.message;
        if message.message_id.trim().is_empty() {
            return Err(OrchestrationError::invalid_request("messageId is required"));
        }
        if message.parts.is_empty() {
            return Err(OrchestrationError::invalid_request("message has no parts"));
        }

        let task_id = message
            .task_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let context_id = match message.context_id.clone().filter(|id| !id.is_empty()) {
            Some(ctx) => ctx,
            None => match self.store.get(None, &task_id).await {
                Some(existing) => existing.context_id,
                None => Uuid::new_v4().to_string(),
            },
        };
        message.task_id = Some(task_id.clone());
        message.context_id = Some(context_id.clone());

        let task = Task::submitted(&task_id, &context_id, message.clone());
        if let Err(existing) = self.store.insert_new(task.clone()).await {
            return Err(if existing.is_terminal() {
                OrchestrationError::TaskAlreadyCompleted { task_id }
            } else {
                OrchestrationError::invalid_request(format!("task {} is already running", task_id))
            });
        }
        log::info!("Task {} accepted in context {}", task_id, context_id);

        let (updater, exec_rx) = TaskUpdater::channel(&task_id, &context_id);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        updater.submit()?;

        let context = RequestContext {
            task_id: task_id.clone(),
            context_id: context_id.clone(),
            message,
            existing_task: Some(task.clone()),
        };
        tokio::spawn(run_executor(self.executor.clone(), context, Arc::new(updater)));
        tokio::spawn(forward_events(self.store.clone(), task, exec_rx, out_tx));

        Ok((task_id, context_id, out_rx))
    }
}

/// Run the executor and make sure the task ends in a terminal state.
async fn run_executor(executor: Arc<dyn AgentExecutor>, context: RequestContext, updater: Arc<TaskUpdater>) {
    let task_id = context.task_id.clone();
    let worker = {
        let updater = updater.clone();
        tokio::spawn(async move { executor.execute(context, &updater).await })
    };

    let failure = match worker.await {
        Ok(Ok(())) if updater.is_terminal() => None,
        Ok(Ok(())) => Some(NO_FINAL_ANSWER.to_string()),
        Ok(Err(e)) => {
            log::error!("Task {} failed: {}", task_id, e);
            Some(format!("Error processing request: {}", e))
        }
        Err(join_err) => {
            log::error!("Task {} executor aborted: {}", task_id, join_err);
            Some(format!("Error processing request: {}", join_err))
        }
    };

    if let Some(reason) = failure {
        if !updater.is_terminal() {
            if let Err(e) = updater.fail(reason) {
                log::error!("Could not fail task {}: {}", task_id, e);
            }
        }
    }
}

/// Apply each event to the stored task, then hand it to the caller.
async fn forward_events(
    store: Arc<dyn TaskStore>,
    mut task: Task,
    mut events: mpsc::UnboundedReceiver<TaskEvent>,
    out: mpsc::UnboundedSender<TaskEvent>,
) {
    while let Some(event) = events.recv().await {
        if !task.apply(&event) {
            log::warn!("Dropping out-of-order {} event for task {}", event.state, task.id);
            continue;
        }
        store.update(task.clone()).await;
        let is_final = event.is_final;
        // A caller that stopped listening does not stop the task.
        let _ = out.send(event);
        if is_final {
            log::info!("Task {} finished as {}", task.id, task.status.state);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::{Message, Part, TaskState};
    use crate::tasks::store::InMemoryTaskStore;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl AgentExecutor for Echo {
        async fn execute(&self, ctx: RequestContext, updater: &TaskUpdater) -> Result<(), OrchestrationError> {
            updater.start_work(None)?;
            updater.update_status(TaskState::Working, updater.agent_message("thinking"))?;
            updater.complete(vec![Part::text(format!("echo: {}", ctx.user_input()))])
        }
    }

    struct Broken;

    #[async_trait]
    impl AgentExecutor for Broken {
        async fn execute(&self, _: RequestContext, updater: &TaskUpdater) -> Result<(), OrchestrationError> {
            updater.start_work(None)?;
            Err(OrchestrationError::computation("ledger unavailable"))
        }
    }

    struct Silent;

    #[async_trait]
    impl AgentExecutor for Silent {
        async fn execute(&self, _: RequestContext, updater: &TaskUpdater) -> Result<(), OrchestrationError> {
            updater.start_work(None)
        }
    }

    struct Panics;

    #[async_trait]
    impl AgentExecutor for Panics {
        async fn execute(&self, _: RequestContext, _: &TaskUpdater) -> Result<(), OrchestrationError> {
            panic!("tool crashed")
        }
    }

    fn manager(executor: impl AgentExecutor + 'static) -> TaskManager {
        TaskManager::new(Arc::new(executor), Arc::new(InMemoryTaskStore::new()))
    }

    fn params(text: &str) -> MessageSendParams {
        MessageSendParams {
            message: Message::user_text(text),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_send_runs_to_completion() {
        let mgr = manager(Echo);
        let task = mgr.on_message_send(params("hello")).await.unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
        assert_eq!(task.artifact_text(), "echo: hello");
        assert!(!task.id.is_empty() && !task.context_id.is_empty());
        // user message plus the intermediate status
        assert_eq!(task.history.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_preserves_order_and_ends_on_final() {
        let mgr = manager(Echo);
        let events: Vec<TaskEvent> = mgr.on_message_stream(params("hi")).await.unwrap().collect().await;
        let states: Vec<TaskState> = events.iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            vec![TaskState::Submitted, TaskState::Working, TaskState::Working, TaskState::Completed]
        );
        assert_eq!(events.iter().filter(|e| e.is_final).count(), 1);
        assert!(events.last().unwrap().artifact.is_some());
    }

    #[tokio::test]
    async fn test_executor_error_becomes_failed_task() {
        let mgr = manager(Broken);
        let task = mgr.on_message_send(params("x")).await.unwrap();
        assert_eq!(task.status.state, TaskState::Failed);
        let text = task.status.message.unwrap().text();
        assert_eq!(text, "Error processing request: ledger unavailable");
        assert!(task.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_executor_without_final_answer_is_failed() {
        let task = manager(Silent).on_message_send(params("x")).await.unwrap();
        assert_eq!(task.status.state, TaskState::Failed);
        assert_eq!(task.status.message.unwrap().text(), NO_FINAL_ANSWER);
    }

    #[tokio::test]
    async fn test_panicking_executor_is_failed() {
        let task = manager(Panics).on_message_send(params("x")).await.unwrap();
        assert_eq!(task.status.state, TaskState::Failed);
    }

    #[tokio::test]
    async fn test_invalid_requests_create_nothing() {
        let mgr = manager(Echo);
        let mut no_id = params("x");
        no_id.message.message_id.clear();
        assert!(matches!(
            mgr.on_message_send(no_id).await,
            Err(OrchestrationError::InvalidRequest { .. })
        ));

        let mut no_parts = params("x");
        no_parts.message.parts.clear();
        assert!(matches!(
            mgr.on_message_send(no_parts).await,
            Err(OrchestrationError::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_task_is_already_completed() {
        let mgr = manager(Echo);
        let first = Message::user_text("one").with_ids("t-1", "c-1");
        mgr.on_message_send(MessageSendParams { message: first, metadata: None }).await.unwrap();

        let again = Message::user_text("two").with_ids("t-1", "c-1");
        let err = mgr
            .on_message_send(MessageSendParams { message: again, metadata: None })
            .await
            .unwrap_err();
        assert_eq!(err, OrchestrationError::TaskAlreadyCompleted { task_id: "t-1".into() });
    }

    #[tokio::test]
    async fn test_get_and_cancel() {
        let mgr = manager(Echo);
        let task = mgr.on_message_send(params("x")).await.unwrap();

        let query = TaskQueryParams { id: task.id.clone(), context_id: None };
        assert_eq!(mgr.on_get_task(query.clone()).await.unwrap(), task);
        assert!(matches!(
            mgr.on_cancel_task(query).await,
            Err(OrchestrationError::Unsupported { .. })
        ));
        assert!(matches!(
            mgr.on_get_task(TaskQueryParams { id: "nope".into(), context_id: None }).await,
            Err(OrchestrationError::TaskNotFound { .. })
        ));
    }
}
