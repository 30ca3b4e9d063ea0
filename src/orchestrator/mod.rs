//! Financial orchestrator.
//!
//! On each inbound request the orchestrator makes sure every configured
//! check agent has been resolved, delegates the request to all reachable
//! agents at once, waits for every answer (each bounded by the delegation
//! timeout) and completes the parent task with the aggregated decision.

pub mod aggregation;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use uuid::Uuid;

use crate::a2a::config::A2AServerConfig;
use crate::a2a::jsonrpc::{SendMessageRequest, SendMessageResponse, SendMessageResult};
use crate::a2a::{AgentSkill, Message, TaskState};
use crate::config::OrchestratorConfig;
use crate::connection::{ConnectionTable, RemoteAgentConnection, UnresolvedAgent};
use crate::error::OrchestrationError;
use crate::registry::AgentCardRegistry;
use crate::sessions::SessionStore;
use crate::tasks::{AgentExecutor, RequestContext, TaskUpdater};

pub use aggregation::{aggregate, parse_verdict, AggregatedDecision, Decision, Unavailable, Verdict};

/// Session key of the context ID used for delegated calls.
const DELEGATED_CONTEXT_KEY: &str = "delegated_context_id";

/// Coordinates the remote check agents.
#[derive(Debug)]
pub struct FinancialOrchestrator {
    config: OrchestratorConfig,
    connections: Arc<ConnectionTable>,
    sessions: Arc<dyn SessionStore>,
}

impl FinancialOrchestrator {
    pub fn new(config: OrchestratorConfig, connections: Arc<ConnectionTable>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            config,
            connections,
            sessions,
        }
    }

    /// Build the orchestrator with its own registry and connection table.
    pub fn from_config(config: OrchestratorConfig, sessions: Arc<dyn SessionStore>) -> Result<Self, reqwest::Error> {
        let registry = Arc::new(AgentCardRegistry::new(config.client_config())?);
        let connections = Arc::new(ConnectionTable::new(registry));
        Ok(Self::new(config, connections, sessions))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn connections(&self) -> &Arc<ConnectionTable> {
        &self.connections
    }

    /// The card this orchestrator publishes at `url`.
    pub fn server_config(&self, url: impl Into<String>) -> A2AServerConfig {
        A2AServerConfig::new(
            self.config.name.clone(),
            "Coordinates expense checks with specialized agents and returns an audited decision.",
            url,
        )
        .with_skill(AgentSkill {
            id: "approve_expense".to_string(),
            name: "Approve Expense".to_string(),
            description: "Checks budget, planning and legal approval of an expense and decides on it.".to_string(),
            tags: vec!["finance".to_string(), "approval".to_string()],
            examples: vec![
                "Approve R$ 2.500 for the Marketing department with supplier XYZ Agency".to_string(),
            ],
        })
    }

    /// Re-resolve every configured agent now.
    pub async fn refresh(&self) -> Vec<UnresolvedAgent> {
        self.connections.refresh(&self.config.remote_agents).await
    }

    /// Evaluate `query` for the conversation `session_id`.
    ///
    /// Progress goes to `updater` as `working` events when one is given.
    pub async fn evaluate(
        &self,
        query: &str,
        session_id: &str,
        updater: Option<&TaskUpdater>,
    ) -> Result<AggregatedDecision, OrchestrationError> {
        let unresolved = self.connections.ensure(&self.config.remote_agents).await;
        let agents = self.connections.snapshot();

        let session = self.sessions.get_or_create(session_id).await;
        let context_id = session
            .get_or_insert_with(DELEGATED_CONTEXT_KEY, || Value::String(Uuid::new_v4().to_string()))
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| OrchestrationError::computation("session holds a non-string delegated context"))?;
        // Fresh per request: remote tasks are single-shot.
        let task_id = Uuid::new_v4().to_string();
        session.push_message(Message::user_text(query));

        let names: Vec<&str> = agents.iter().map(|c| c.name()).collect();
        log::info!("Delegating to {} agent(s): {:?}", agents.len(), names);
        progress(updater, || {
            if agents.is_empty() {
                "No check agents are reachable".to_string()
            } else {
                format!("Consulting {}", names.join(", "))
            }
        });

        let timeout = self.config.delegation_timeout();
        let results = join_all(agents.iter().map(|conn| {
            let task_id = task_id.clone();
            let context_id = context_id.clone();
            async move {
                let outcome = match tokio::time::timeout(timeout, delegate(conn, query, &task_id, &context_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(OrchestrationError::DelegationTimeout {
                        agent: conn.name().to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                };
                match &outcome {
                    Ok(v) => progress(updater, || {
                        let vote = if v.approved { "approved" } else { "rejected" };
                        format!("{} {}: {}", v.agent, vote, v.rationale)
                    }),
                    Err(e) => {
                        log::warn!("{}", e);
                        progress(updater, || format!("{} did not answer: {}", conn.name(), e));
                    }
                }
                (conn.name().to_string(), outcome)
            }
        }))
        .await;

        let mut verdicts = Vec::new();
        let mut unavailable: Vec<Unavailable> = unresolved
            .into_iter()
            .map(|u| Unavailable {
                agent: u.label,
                reason: format!("unreachable at {}: {}", u.url, u.reason),
            })
            .collect();
        for (agent, outcome) in results {
            match outcome {
                Ok(verdict) => verdicts.push(verdict),
                Err(e) if e.is_unavailability() => unavailable.push(Unavailable {
                    agent,
                    reason: e.to_string(),
                }),
                Err(e) => return Err(e),
            }
        }

        let decision = aggregate(verdicts, unavailable, self.config.unavailable_policy);
        log::info!(
            "Decision: {} ({} vote(s), {} unavailable)",
            decision.decision,
            decision.verdicts.len(),
            decision.unavailable.len()
        );
        session.push_message(Message::agent_text(decision.rationale()));
        Ok(decision)
    }
}

/// Send the query to one agent and read its vote.
async fn delegate(
    conn: &RemoteAgentConnection,
    query: &str,
    task_id: &str,
    context_id: &str,
) -> Result<Verdict, OrchestrationError> {
    let message = Message::user_text(query).with_ids(task_id, context_id);
    let request = SendMessageRequest::new(message);
    log::debug!("Sending message {} to {}", request.id, conn.name());

    let response = conn
        .send_message(&request)
        .await
        .map_err(|e| OrchestrationError::Unreachable {
            url: conn.url.clone(),
            reason: e.to_string(),
        })?;
    let malformed = |reason: String| OrchestrationError::MalformedResponse {
        agent: conn.name().to_string(),
        reason,
    };
    match response {
        SendMessageResponse::Success(SendMessageResult::Task(task)) => parse_verdict(conn.name(), &task),
        SendMessageResponse::Success(SendMessageResult::Message(_)) => {
            Err(malformed("answered with a message instead of a task".to_string()))
        }
        SendMessageResponse::Error(e) => Err(malformed(e.to_string())),
    }
}

fn progress<F: FnOnce() -> String>(updater: Option<&TaskUpdater>, text: F) {
    if let Some(updater) = updater {
        if let Err(e) = updater.update_status(TaskState::Working, updater.agent_message(text())) {
            log::warn!("Could not publish progress: {}", e);
        }
    }
}

#[async_trait]
impl AgentExecutor for FinancialOrchestrator {
    async fn execute(&self, context: RequestContext, updater: &TaskUpdater) -> Result<(), OrchestrationError> {
        updater.start_work(Some(updater.agent_message("The financial orchestrator is checking the expense...")))?;
        let decision = self.evaluate(&context.user_input(), &context.context_id, Some(updater)).await?;
        updater.complete(decision.to_parts())
    }
}
