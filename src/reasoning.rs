//! Reasoning collaborator and tool dispatch.
//!
//! An agent's reasoning is a loop over [`ReasoningStep`]s: the engine looks
//! at the conversation and either answers or asks for a tool to be run. The
//! task machinery only needs to tell those two apart, so any engine (a
//! language model, a rule set) plugs in behind [`ReasoningEngine`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::a2a::{Message, Part, Role, TaskState};
use crate::checks::{CheckOutcome, ExpenseRequest};
use crate::error::OrchestrationError;
use crate::sessions::SessionStore;
use crate::tasks::{AgentExecutor, RequestContext, TaskUpdater};

/// Default bound on reasoning iterations per task.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// What the engine wants to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReasoningStep {
    /// Finish with this answer; `data` carries a structured form of it.
    FinalAnswer {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    /// Run the named tool with these arguments.
    ToolCall { name: String, args: Value },
}

impl ReasoningStep {
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self::FinalAnswer {
            text: text.into(),
            data: None,
        }
    }

    pub fn tool_call(name: impl Into<String>, args: Value) -> Self {
        Self::ToolCall {
            name: name.into(),
            args,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }
}

/// Produces the next step from an instruction and the conversation so far.
#[async_trait]
pub trait ReasoningEngine: Send + Sync + fmt::Debug {
    async fn next_step(&self, instruction: &str, history: &[Message]) -> Result<ReasoningStep, OrchestrationError>;
}

/// A named capability the engine may call.
#[async_trait]
pub trait Tool: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn call(&self, args: &Value) -> Result<String, OrchestrationError>;
}

/// History entry recording a tool's output.
pub fn tool_result_message(tool: &str, output: &str) -> Message {
    Message::new(Role::Agent, vec![Part::data(json!({ "tool": tool, "output": output }))])
}

/// The output of `tool` if `message` records one.
pub fn tool_output<'a>(message: &'a Message, tool: &str) -> Option<&'a str> {
    message.parts.iter().find_map(|part| match part {
        Part::Data { data } if data.get("tool").and_then(Value::as_str) == Some(tool) => {
            data.get("output").and_then(Value::as_str)
        }
        _ => None,
    })
}

/// Messages after (and including) the latest user message.
fn current_turn(history: &[Message]) -> Option<&[Message]> {
    history.iter().rposition(|m| m.role == Role::User).map(|i| &history[i..])
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs a reasoning loop with tools for each task.
///
/// The session for the task's context keeps the conversation, so repeated
/// requests in one context see earlier turns.
pub struct ToolCallingExecutor {
    instruction: String,
    engine: Arc<dyn ReasoningEngine>,
    tools: HashMap<String, Arc<dyn Tool>>,
    sessions: Arc<dyn SessionStore>,
    max_iterations: usize,
}

impl fmt::Debug for ToolCallingExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tools: Vec<&String> = self.tools.keys().collect();
        tools.sort();
        f.debug_struct("ToolCallingExecutor")
            .field("engine", &self.engine)
            .field("tools", &tools)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

impl ToolCallingExecutor {
    pub fn new(instruction: impl Into<String>, engine: Arc<dyn ReasoningEngine>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            instruction: instruction.into(),
            engine,
            tools: HashMap::new(),
            sessions,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[async_trait]
impl AgentExecutor for ToolCallingExecutor {
    async fn execute(&self, context: RequestContext, updater: &TaskUpdater) -> Result<(), OrchestrationError> {
        updater.start_work(None)?;
        let session = self.sessions.get_or_create(&context.context_id).await;
        session.push_message(context.message.clone());

        for iteration in 0..self.max_iterations {
            let history = session.history();
            let step = self.engine.next_step(&self.instruction, &history).await?;
            log::debug!("Task {} step {}: {:?}", context.task_id, iteration + 1, step);

            match step {
                ReasoningStep::FinalAnswer { text, data } => {
                    session.push_message(updater.agent_message(text.clone()));
                    let mut parts = vec![Part::text(text)];
                    if let Some(data) = data {
                        parts.push(Part::data(data));
                    }
                    return updater.complete(parts);
                }
                ReasoningStep::ToolCall { name, args } => {
                    let tool = self
                        .tools
                        .get(&name)
                        .ok_or_else(|| OrchestrationError::computation(format!("unknown tool '{}'", name)))?;
                    let output = tool.call(&args).await?;
                    session.push_message(tool_result_message(&name, &output));
                    updater.update_status(
                        TaskState::Working,
                        updater.agent_message(format!("{} returned: {}", name, output)),
                    )?;
                }
            }
        }

        Err(OrchestrationError::computation(format!(
            "no final answer after {} reasoning steps",
            self.max_iterations
        )))
    }
}

// ---------------------------------------------------------------------------
// Deterministic engine for the check agents
// ---------------------------------------------------------------------------

/// Rule-based engine driving a single check tool.
///
/// Extracts the expense from the latest user message, calls the tool once,
/// then answers with the tool's [`CheckOutcome`].
#[derive(Debug, Clone)]
pub struct ExpenseCheckReasoner {
    tool: String,
}

impl ExpenseCheckReasoner {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

#[async_trait]
impl ReasoningEngine for ExpenseCheckReasoner {
    async fn next_step(&self, _instruction: &str, history: &[Message]) -> Result<ReasoningStep, OrchestrationError> {
        let turn = current_turn(history).ok_or_else(|| OrchestrationError::computation("no request to check"))?;

        if let Some(output) = turn.iter().rev().find_map(|m| tool_output(m, &self.tool)) {
            let outcome: CheckOutcome = serde_json::from_str(output).map_err(|e| {
                OrchestrationError::computation(format!("{} returned an unexpected result: {}", self.tool, e))
            })?;
            let data = serde_json::to_value(&outcome).map_err(|e| OrchestrationError::computation(e.to_string()))?;
            return Ok(ReasoningStep::FinalAnswer {
                text: outcome.rationale,
                data: Some(data),
            });
        }

        let request = ExpenseRequest::parse(&turn[0].text());
        let args = serde_json::to_value(&request).map_err(|e| OrchestrationError::computation(e.to_string()))?;
        Ok(ReasoningStep::tool_call(self.tool.clone(), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::InMemorySessionStore;
    use crate::tasks::{InMemoryTaskStore, TaskManager};
    use crate::a2a::jsonrpc::MessageSendParams;

    #[derive(Debug)]
    struct Approver;

    #[async_trait]
    impl Tool for Approver {
        fn name(&self) -> &str {
            "approve"
        }

        fn description(&self) -> &str {
            "always approves"
        }

        async fn call(&self, _args: &Value) -> Result<String, OrchestrationError> {
            Ok(serde_json::to_string(&CheckOutcome::approve("looks fine")).unwrap())
        }
    }

    #[derive(Debug)]
    struct Looping;

    #[async_trait]
    impl ReasoningEngine for Looping {
        async fn next_step(&self, _: &str, _: &[Message]) -> Result<ReasoningStep, OrchestrationError> {
            Ok(ReasoningStep::tool_call("approve", json!({})))
        }
    }

    fn manager(engine: Arc<dyn ReasoningEngine>) -> TaskManager {
        let executor = ToolCallingExecutor::new("check", engine, Arc::new(InMemorySessionStore::new()))
            .with_tool(Arc::new(Approver))
            .with_max_iterations(3);
        TaskManager::new(Arc::new(executor), Arc::new(InMemoryTaskStore::new()))
    }

    fn send(text: &str) -> MessageSendParams {
        MessageSendParams {
            message: Message::user_text(text),
            metadata: None,
        }
    }

    #[test]
    fn test_reasoning_step_is_tagged() {
        let step: ReasoningStep =
            serde_json::from_value(json!({"kind": "tool_call", "name": "check_budget", "args": {"amount": 10.0}})).unwrap();
        assert!(!step.is_final());
        assert!(ReasoningStep::final_answer("done").is_final());
    }

    #[tokio::test]
    async fn test_check_reasoner_calls_tool_then_answers() {
        let reasoner = ExpenseCheckReasoner::new("approve");
        let mut history = vec![Message::user_text("R$ 2.500 for Marketing department")];

        match reasoner.next_step("", &history).await.unwrap() {
            ReasoningStep::ToolCall { name, args } => {
                assert_eq!(name, "approve");
                assert_eq!(args["amount"], json!(2500.0));
            }
            other => panic!("expected a tool call, got {:?}", other),
        }

        history.push(tool_result_message("approve", r#"{"approved":true,"rationale":"ok"}"#));
        let step = reasoner.next_step("", &history).await.unwrap();
        assert_eq!(
            step,
            ReasoningStep::FinalAnswer {
                text: "ok".into(),
                data: Some(json!({"approved": true, "rationale": "ok"})),
            }
        );
    }

    #[tokio::test]
    async fn test_earlier_turns_do_not_leak_into_new_request() {
        let reasoner = ExpenseCheckReasoner::new("approve");
        let history = vec![
            Message::user_text("first"),
            tool_result_message("approve", r#"{"approved":true,"rationale":"ok"}"#),
            Message::user_text("second"),
        ];
        assert!(!reasoner.next_step("", &history).await.unwrap().is_final());
    }

    #[tokio::test]
    async fn test_executor_completes_with_text_and_data() {
        let task = manager(Arc::new(ExpenseCheckReasoner::new("approve")))
            .on_message_send(send("anything"))
            .await
            .unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
        let parts = &task.artifacts[0].parts;
        assert_eq!(parts[0].as_text().as_deref(), Some("looks fine"));
        assert!(matches!(&parts[1], Part::Data { data } if data["approved"] == json!(true)));
    }

    #[tokio::test]
    async fn test_iteration_limit_fails_task() {
        let task = manager(Arc::new(Looping)).on_message_send(send("x")).await.unwrap();
        assert_eq!(task.status.state, TaskState::Failed);
        assert!(task.status.message.unwrap().text().contains("no final answer after 3"));
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_task() {
        let task = manager(Arc::new(ExpenseCheckReasoner::new("missing")))
            .on_message_send(send("x"))
            .await
            .unwrap();
        assert_eq!(task.status.state, TaskState::Failed);
        assert!(task.status.message.unwrap().text().contains("unknown tool 'missing'"));
    }
}
