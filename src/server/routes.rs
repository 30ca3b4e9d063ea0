//! Axum route handlers for the A2A server.

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::a2a::config::A2AServerConfig;
use crate::a2a::jsonrpc::{
    JsonRpcRequest, JsonRpcResponse, MessageSendParams, SendMessageResult, TaskQueryParams,
    METHOD_MESSAGE_SEND, METHOD_MESSAGE_STREAM, METHOD_TASKS_CANCEL, METHOD_TASKS_GET,
};
use crate::a2a::{A2AError, A2AErrorCode, AgentCard};
use crate::tasks::TaskManager;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Card published at the well-known paths.
    pub card: Arc<AgentCard>,
    /// Request handler for the JSON-RPC methods.
    pub manager: TaskManager,
}

impl AppState {
    pub fn new(card: AgentCard, manager: TaskManager) -> Self {
        Self {
            card: Arc::new(card),
            manager,
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState, rpc_path: &str) -> Router {
    Router::new()
        .route("/.well-known/agent-card.json", get(agent_card_handler))
        .route("/.well-known/agent-card", get(agent_card_handler))
        .route("/.well-known/agent.json", get(agent_card_handler))
        .route("/health", get(health_handler))
        .route(rpc_path, post(rpc_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router for an agent described by `config`.
pub fn agent_router(config: &A2AServerConfig, manager: TaskManager) -> Router {
    app_router(AppState::new(config.agent_card(), manager), &config.rpc_path)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await
}

/// GET /.well-known/agent-card.json
async fn agent_card_handler(State(state): State<AppState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}

/// GET /health — liveness probe.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": state.card.name,
    }))
}

/// POST <rpc_path> — JSON-RPC dispatch.
///
/// Protocol errors travel in the error envelope with HTTP 200.
async fn rpc_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("Rejecting unparsable JSON-RPC body: {}", e);
            return error_response(None, A2AError::from_code(A2AErrorCode::JsonParseError));
        }
    };
    let id = raw.get("id").cloned();
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => return error_response(id, A2AError::new(A2AErrorCode::InvalidRequest, e.to_string())),
    };
    if request.jsonrpc != "2.0" {
        return error_response(id, A2AError::new(A2AErrorCode::InvalidRequest, "jsonrpc must be \"2.0\""));
    }
    log::debug!("JSON-RPC {} (id {})", request.method, request.id);

    let id = request.id.clone();
    match request.method.as_str() {
        METHOD_MESSAGE_SEND => {
            let params: MessageSendParams = match parse_params(&request) {
                Ok(p) => p,
                Err(e) => return error_response(Some(id), e),
            };
            match state.manager.on_message_send(params).await {
                Ok(task) => result_response(id, &SendMessageResult::Task(task)),
                Err(e) => error_response(Some(id), e.into()),
            }
        }
        METHOD_MESSAGE_STREAM => {
            let stream = match parse_params::<MessageSendParams>(&request) {
                Ok(params) => state.manager.on_message_stream(params).await.map_err(A2AError::from),
                Err(e) => Err(e),
            };
            match stream {
                Ok(events) => {
                    let frames = events.map(move |event| Event::default().json_data(envelope(id.clone(), &event)));
                    Sse::new(frames).keep_alive(KeepAlive::default()).into_response()
                }
                // Streaming callers read SSE, so the error goes out as a single frame.
                Err(e) => {
                    let frame = Event::default().json_data(JsonRpcResponse::failure(id, e));
                    Sse::new(tokio_stream::once(frame)).into_response()
                }
            }
        }
        METHOD_TASKS_GET => match parse_params::<TaskQueryParams>(&request) {
            Ok(params) => match state.manager.on_get_task(params).await {
                Ok(task) => result_response(id, &task),
                Err(e) => error_response(Some(id), e.into()),
            },
            Err(e) => error_response(Some(id), e),
        },
        METHOD_TASKS_CANCEL => match parse_params::<TaskQueryParams>(&request) {
            Ok(params) => match state.manager.on_cancel_task(params).await {
                Ok(task) => result_response(id, &task),
                Err(e) => error_response(Some(id), e.into()),
            },
            Err(e) => error_response(Some(id), e),
        },
        other => error_response(
            Some(id),
            A2AError::new(A2AErrorCode::MethodNotFound, format!("Method not found: {}", other)),
        ),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, A2AError> {
    serde_json::from_value(request.params.clone())
        .map_err(|e| A2AError::new(A2AErrorCode::InvalidParams, format!("Invalid params: {}", e)))
}

fn envelope<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(id, A2AError::new(A2AErrorCode::InternalError, e.to_string())),
    }
}

fn result_response<T: Serialize>(id: Value, result: &T) -> Response {
    Json(envelope(id, result)).into_response()
}

fn error_response(id: Option<Value>, error: A2AError) -> Response {
    Json(error.to_response(id)).into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::{Message, Part, TaskState};
    use crate::error::OrchestrationError;
    use crate::tasks::{AgentExecutor, InMemoryTaskStore, RequestContext, TaskUpdater};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct Echo;

    #[async_trait]
    impl AgentExecutor for Echo {
        async fn execute(&self, ctx: RequestContext, updater: &TaskUpdater) -> Result<(), OrchestrationError> {
            updater.start_work(None)?;
            updater.complete(vec![Part::text(ctx.user_input())])
        }
    }

    fn app() -> Router {
        let config = A2AServerConfig::new("echo_agent", "Echoes its input", "http://localhost:9999/");
        let manager = TaskManager::new(Arc::new(Echo), Arc::new(InMemoryTaskStore::new()));
        agent_router(&config, manager)
    }

    fn rpc(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn send_body(method: &str, message: Message) -> String {
        serde_json::to_string(&JsonRpcRequest::new(
            "req-1",
            method,
            serde_json::json!({ "message": message }),
        ))
        .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_agent_card_paths() {
        for path in ["/.well-known/agent-card.json", "/.well-known/agent-card", "/.well-known/agent.json"] {
            let request = Request::builder().uri(path).body(Body::empty()).unwrap();
            let response = app().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let card: AgentCard = serde_json::from_value(json_body(response).await).unwrap();
            assert_eq!(card.name, "echo_agent");
            assert!(card.capabilities.streaming);
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let json = json_body(app().oneshot(request).await.unwrap()).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
        assert_eq!(json["service"], "echo_agent");
    }

    #[tokio::test]
    async fn test_message_send_returns_completed_task() {
        let response = app()
            .oneshot(rpc(send_body(METHOD_MESSAGE_SEND, Message::user_text("ping"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["id"], "req-1");
        assert_eq!(json["result"]["kind"], "task");
        assert_eq!(json["result"]["status"]["state"], "completed");
        assert_eq!(json["result"]["artifacts"][0]["parts"][0]["text"], "ping");
    }

    #[tokio::test]
    async fn test_message_stream_is_event_stream() {
        let response = app()
            .oneshot(rpc(send_body(METHOD_MESSAGE_STREAM, Message::user_text("ping"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/event-stream"));

        let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let states: Vec<TaskState> = text
            .split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data:"))
            .map(|data| {
                let envelope: JsonRpcResponse = serde_json::from_str(data.trim_start()).unwrap();
                serde_json::from_value::<crate::a2a::TaskEvent>(envelope.result.unwrap()).unwrap().state
            })
            .collect();
        assert_eq!(states, vec![TaskState::Submitted, TaskState::Working, TaskState::Completed]);
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let json = json_body(app().oneshot(rpc("{not json".into())).await.unwrap()).await;
        assert_eq!(json["error"]["code"], -32700);

        let body = serde_json::to_string(&JsonRpcRequest::new("r", "tasks/list", Value::Null)).unwrap();
        let json = json_body(app().oneshot(rpc(body)).await.unwrap()).await;
        assert_eq!(json["error"]["code"], -32601);

        let body = serde_json::to_string(&JsonRpcRequest::new("r", METHOD_MESSAGE_SEND, serde_json::json!({}))).unwrap();
        let json = json_body(app().oneshot(rpc(body)).await.unwrap()).await;
        assert_eq!(json["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_cancel_is_unsupported_and_duplicates_rejected() {
        let app = app();
        let message = Message::user_text("once").with_ids("t-1", "c-1");
        let first = json_body(app.clone().oneshot(rpc(send_body(METHOD_MESSAGE_SEND, message.clone()))).await.unwrap()).await;
        assert_eq!(first["result"]["status"]["state"], "completed");

        let second = json_body(app.clone().oneshot(rpc(send_body(METHOD_MESSAGE_SEND, message))).await.unwrap()).await;
        assert_eq!(second["error"]["code"], -32019);

        let body = serde_json::to_string(&JsonRpcRequest::new(
            "r",
            METHOD_TASKS_CANCEL,
            serde_json::json!({"id": "t-1", "contextId": "c-1"}),
        ))
        .unwrap();
        let json = json_body(app.oneshot(rpc(body)).await.unwrap()).await;
        assert_eq!(json["error"]["code"], -32004);
    }
}
