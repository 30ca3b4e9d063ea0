//! A2A client for remote agent delegation.
//!
//! Provides an async client for communicating with remote A2A agents:
//! agent card retrieval, `message/send`, `message/stream` (Server-Sent
//! Events), `tasks/get` and `tasks/cancel`.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::config::A2AClientConfig;
use super::errors::A2AError;
use super::jsonrpc::{
    JsonRpcRequest, JsonRpcResponse, SendMessageRequest, SendMessageResponse, SendMessageResult,
    TaskQueryParams, METHOD_MESSAGE_SEND, METHOD_MESSAGE_STREAM, METHOD_TASKS_CANCEL,
    METHOD_TASKS_GET,
};
use super::types::{AgentCard, Task, TaskEvent};

/// Errors raised by [`A2AClient`].
#[derive(Debug, Error)]
pub enum A2AClientError {
    /// Connection failure, timeout or body read error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Http { status: u16, url: String, body: String },

    /// The remote answered, but not with what the protocol requires.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The remote answered with a JSON-RPC error envelope.
    #[error("remote error {0}")]
    Rpc(A2AError),
}

/// Client for communicating with one remote A2A agent.
#[derive(Debug, Clone)]
pub struct A2AClient {
    /// Base URL of the remote A2A agent.
    pub endpoint: String,
    /// Paths and timeouts.
    pub config: A2AClientConfig,
    http: reqwest::Client,
}

impl A2AClient {
    /// Create a new `A2AClient` with its own HTTP connection pool.
    pub fn new(endpoint: impl Into<String>, config: A2AClientConfig) -> Result<Self, A2AClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_http_client(endpoint, http, config))
    }

    /// Create a client sharing an existing HTTP connection pool.
    pub fn with_http_client(
        endpoint: impl Into<String>,
        http: reqwest::Client,
        config: A2AClientConfig,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            http,
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    /// Retrieve the agent card from the remote agent.
    pub async fn fetch_agent_card(&self) -> Result<AgentCard, A2AClientError> {
        let url = self.url_for(&self.config.agent_card_path);
        log::debug!("Fetching agent card from: {}", url);

        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(A2AClientError::Http { status, url, body });
        }

        let body = resp.bytes().await?;
        let card: AgentCard = serde_json::from_slice(&body)
            .map_err(|e| A2AClientError::Malformed(format!("agent card from {}: {}", url, e)))?;
        if card.name.trim().is_empty() {
            return Err(A2AClientError::Malformed(format!("agent card from {} has an empty name", url)));
        }
        Ok(card)
    }

    async fn call(&self, id: &str, method: &str, params: Value) -> Result<JsonRpcResponse, A2AClientError> {
        let url = self.url_for(&self.config.rpc_path);
        log::debug!("Calling {} on {}", method, url);

        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&JsonRpcRequest::new(id, method, params))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(A2AClientError::Http { status, url, body });
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| A2AClientError::Malformed(format!("{} response: {}", method, e)))
    }

    fn decode_result<T: DeserializeOwned>(method: &str, resp: JsonRpcResponse) -> Result<T, A2AClientError> {
        if let Some(error) = resp.error {
            return Err(A2AClientError::Rpc(error));
        }
        let result = resp
            .result
            .ok_or_else(|| A2AClientError::Malformed(format!("{} response has neither result nor error", method)))?;
        serde_json::from_value(result)
            .map_err(|e| A2AClientError::Malformed(format!("{} result: {}", method, e)))
    }

    /// Send a message to the remote agent and wait for the response.
    ///
    /// A JSON-RPC error envelope is returned as
    /// [`SendMessageResponse::Error`], not as an `Err`.
    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<SendMessageResponse, A2AClientError> {
        let params = serde_json::to_value(&request.params)
            .map_err(|e| A2AClientError::Malformed(e.to_string()))?;
        let resp = self.call(&request.id, METHOD_MESSAGE_SEND, params).await?;
        match Self::decode_result::<SendMessageResult>(METHOD_MESSAGE_SEND, resp) {
            Ok(result) => Ok(SendMessageResponse::Success(result)),
            Err(A2AClientError::Rpc(error)) => Ok(SendMessageResponse::Error(error)),
            Err(other) => Err(other),
        }
    }

    /// Send a message and subscribe to the task's event stream.
    ///
    /// The returned stream ends after the final event.
    pub async fn stream_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<BoxStream<'static, Result<TaskEvent, A2AClientError>>, A2AClientError> {
        let url = self.url_for(&self.config.rpc_path);
        let params = serde_json::to_value(&request.params)
            .map_err(|e| A2AClientError::Malformed(e.to_string()))?;

        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&JsonRpcRequest::new(request.id.clone(), METHOD_MESSAGE_STREAM, params))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(A2AClientError::Http { status, url, body });
        }

        Ok(sse_events(resp.bytes_stream()).boxed())
    }

    /// Fetch a task snapshot via `tasks/get`.
    pub async fn get_task(&self, task_id: &str) -> Result<Task, A2AClientError> {
        let params = task_query(task_id)?;
        let resp = self.call(&Uuid::new_v4().to_string(), METHOD_TASKS_GET, params).await?;
        Self::decode_result(METHOD_TASKS_GET, resp)
    }

    /// Ask the remote agent to cancel a task via `tasks/cancel`.
    pub async fn cancel_task(&self, task_id: &str) -> Result<Task, A2AClientError> {
        log::debug!("Cancelling A2A task {} at {}", task_id, self.endpoint);
        let params = task_query(task_id)?;
        let resp = self.call(&Uuid::new_v4().to_string(), METHOD_TASKS_CANCEL, params).await?;
        Self::decode_result(METHOD_TASKS_CANCEL, resp)
    }
}

fn task_query(task_id: &str) -> Result<Value, A2AClientError> {
    serde_json::to_value(TaskQueryParams { id: task_id.to_string(), context_id: None })
        .map_err(|e| A2AClientError::Malformed(e.to_string()))
}

// ---------------------------------------------------------------------------
// Server-Sent Events decoding
// ---------------------------------------------------------------------------

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct SseState {
    body: ByteStream,
    buffer: Vec<u8>,
    done: bool,
}

/// Decode a `text/event-stream` body into task events.
fn sse_events<S>(body: S) -> impl Stream<Item = Result<TaskEvent, A2AClientError>>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        buffer: Vec::new(),
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            if let Some(pos) = find_frame_end(&state.buffer) {
                let frame: Vec<u8> = state.buffer.drain(..pos + 2).collect();
                match parse_sse_frame(&String::from_utf8_lossy(&frame)) {
                    None => continue,
                    Some(Ok(event)) => {
                        state.done = event.is_final;
                        return Some((Ok(event), state));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(A2AClientError::Transport(e)), state));
                }
                None => return None,
            }
        }
    })
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Parse one SSE frame. Frames without `data:` lines (keep-alives) yield `None`.
fn parse_sse_frame(frame: &str) -> Option<Result<TaskEvent, A2AClientError>> {
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();
    if data.is_empty() {
        return None;
    }
    let payload = data.join("\n");
    let resp: JsonRpcResponse = match serde_json::from_str(&payload) {
        Ok(resp) => resp,
        Err(e) => return Some(Err(A2AClientError::Malformed(format!("stream frame: {}", e)))),
    };
    Some(A2AClient::decode_result(METHOD_MESSAGE_STREAM, resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::a2a::config::A2AServerConfig;
    use crate::a2a::errors::A2AErrorCode;
    use crate::a2a::types::{Message, Part, TaskState};
    use crate::error::OrchestrationError;
    use crate::server::agent_router;
    use crate::tasks::{AgentExecutor, InMemoryTaskStore, RequestContext, TaskManager, TaskUpdater};

    struct Echo;

    #[async_trait]
    impl AgentExecutor for Echo {
        async fn execute(&self, ctx: RequestContext, updater: &TaskUpdater) -> Result<(), OrchestrationError> {
            updater.start_work(None)?;
            updater.update_status(TaskState::Working, updater.agent_message("echoing"))?;
            updater.complete(vec![Part::text(ctx.user_input())])
        }
    }

    async fn echo_agent() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let config = A2AServerConfig::new("echo_agent", "Echoes its input", format!("{}/", url));
        let manager = TaskManager::new(Arc::new(Echo), Arc::new(InMemoryTaskStore::new()));
        let router = agent_router(&config, manager);
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        url
    }

    fn rpc_code<T: std::fmt::Debug>(result: Result<T, A2AClientError>) -> i32 {
        match result {
            Err(A2AClientError::Rpc(error)) => error.code,
            other => panic!("expected a JSON-RPC error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_get_and_cancel_against_served_agent() {
        let client = A2AClient::new(echo_agent().await, A2AClientConfig::default()).unwrap();
        assert_eq!(client.fetch_agent_card().await.unwrap().name, "echo_agent");

        let request = SendMessageRequest::new(Message::user_text("ping"));
        let events: Vec<TaskEvent> = client
            .stream_message(&request)
            .await
            .unwrap()
            .map(|event| event.unwrap())
            .collect()
            .await;
        let states: Vec<TaskState> = events.iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            vec![TaskState::Submitted, TaskState::Working, TaskState::Working, TaskState::Completed]
        );

        let task_id = events[0].task_id.clone();
        let task = client.get_task(&task_id).await.unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
        assert_eq!(task.artifact_text(), "ping");

        assert_eq!(rpc_code(client.cancel_task(&task_id).await), A2AErrorCode::UnsupportedOperation as i32);
        assert_eq!(rpc_code(client.get_task("missing").await), A2AErrorCode::TaskNotFound as i32);
    }

    #[tokio::test]
    async fn test_send_message_returns_task() {
        let client = A2AClient::new(echo_agent().await, A2AClientConfig::default()).unwrap();
        let request = SendMessageRequest::new(Message::user_text("hello"));
        match client.send_message(&request).await.unwrap() {
            SendMessageResponse::Success(SendMessageResult::Task(task)) => {
                assert_eq!(task.status.state, TaskState::Completed);
                assert_eq!(task.artifact_text(), "hello");
            }
            other => panic!("expected a task, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sse_frame() {
        let event = TaskEvent::new("t", "c", TaskState::Working, None, None);
        let envelope = JsonRpcResponse::success(Value::from("1"), serde_json::to_value(&event).unwrap());
        let frame = format!("data: {}\n\n", serde_json::to_string(&envelope).unwrap());
        let parsed = parse_sse_frame(&frame).unwrap().unwrap();
        assert_eq!(parsed.state, TaskState::Working);
        assert!(!parsed.is_final);
    }

    #[test]
    fn test_keepalive_frame_is_skipped() {
        assert!(parse_sse_frame(":\n\n").is_none());
    }

    #[test]
    fn test_error_frame() {
        let envelope = JsonRpcResponse::failure(
            Value::from("1"),
            A2AError::from_code(crate::a2a::errors::A2AErrorCode::TaskAlreadyCompleted),
        );
        let frame = format!("data: {}\n\n", serde_json::to_string(&envelope).unwrap());
        assert!(matches!(parse_sse_frame(&frame), Some(Err(A2AClientError::Rpc(_)))));
    }

    #[tokio::test]
    async fn test_sse_events_split_across_chunks() {
        let first = TaskEvent::new("t", "c", TaskState::Working, None, None);
        let last = TaskEvent::new("t", "c", TaskState::Completed, None, None);
        let mut body = String::new();
        for ev in [&first, &last] {
            let env = JsonRpcResponse::success(Value::from("1"), serde_json::to_value(ev).unwrap());
            body.push_str(&format!("data: {}\n\n", serde_json::to_string(&env).unwrap()));
        }
        let bytes = body.into_bytes();
        let (a, b) = bytes.split_at(bytes.len() / 3);
        let chunks: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(a)),
            Ok(Bytes::copy_from_slice(b)),
        ];
        let events: Vec<_> = sse_events(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].as_ref().unwrap().is_final);
    }
}
