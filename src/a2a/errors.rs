//! A2A error codes and JSON-RPC error envelopes.
//!
//! Error codes follow JSON-RPC 2.0 conventions:
//! - -32700 to -32600: Standard JSON-RPC errors
//! - -32099 to -32000: Server errors (A2A-specific)

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A2A protocol error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum A2AErrorCode {
    // JSON-RPC 2.0 Standard Errors
    /// Invalid JSON was received by the server.
    JsonParseError = -32700,
    /// The JSON sent is not a valid Request object.
    InvalidRequest = -32600,
    /// The method does not exist / is not available.
    MethodNotFound = -32601,
    /// Invalid method parameter(s).
    InvalidParams = -32602,
    /// Internal JSON-RPC error.
    InternalError = -32603,

    // A2A-Specific Errors
    /// The specified task was not found.
    TaskNotFound = -32001,
    /// The task cannot be canceled.
    TaskNotCancelable = -32002,
    /// The requested operation is not supported.
    UnsupportedOperation = -32004,
    /// The agent produced an invalid response.
    InvalidAgentResponse = -32006,

    // Extensions
    /// Task execution timed out.
    TaskTimeout = -32014,
    /// The task already reached a terminal state and cannot be resumed.
    TaskAlreadyCompleted = -32019,
}

impl A2AErrorCode {
    /// Get the default error message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::JsonParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::TaskNotFound => "Task not found",
            Self::TaskNotCancelable => "Task not cancelable",
            Self::UnsupportedOperation => "This operation is not supported",
            Self::InvalidAgentResponse => "Invalid agent response",
            Self::TaskTimeout => "Task execution timed out",
            Self::TaskAlreadyCompleted => "Task already completed",
        }
    }
}

/// A JSON-RPC error object as carried by an error envelope.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub struct A2AError {
    /// The A2A/JSON-RPC error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for A2AError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl A2AError {
    /// Create a new `A2AError` from an error code with default message.
    pub fn from_code(code: A2AErrorCode) -> Self {
        Self {
            code: code as i32,
            message: code.default_message().to_string(),
            data: None,
        }
    }

    /// Create a new `A2AError` with a custom message.
    pub fn new(code: A2AErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: None,
        }
    }

    /// Convert to full JSON-RPC error response.
    pub fn to_response(&self, request_id: Option<Value>) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "error": self,
            "id": request_id.unwrap_or(Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_envelope() {
        let err = A2AError::from_code(A2AErrorCode::UnsupportedOperation);
        let resp = err.to_response(Some(Value::String("req-1".into())));
        assert_eq!(resp["jsonrpc"], "2.0");
        assert_eq!(resp["id"], "req-1");
        assert_eq!(resp["error"]["code"], -32004);
        assert_eq!(resp["error"]["message"], "This operation is not supported");
        assert!(resp["error"].get("data").is_none());
    }

    #[test]
    fn test_null_id_when_unknown() {
        let resp = A2AError::from_code(A2AErrorCode::JsonParseError).to_response(None);
        assert!(resp["id"].is_null());
    }
}
