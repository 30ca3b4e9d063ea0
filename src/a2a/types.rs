//! Type definitions for the A2A protocol: agent cards, messages, tasks,
//! artifacts and streaming task events.
//!
//! Field names follow the A2A wire format (camelCase JSON).

use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Agent card types
// ---------------------------------------------------------------------------

/// A2A protocol version advertised on agent cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "0.2.6")]
    V0_2_6,
    #[default]
    #[serde(rename = "0.3.0")]
    V0_3_0,
}

/// Describes a skill that an A2A agent offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    /// Unique identifier for the skill.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Description of what the skill does.
    #[serde(default)]
    pub description: String,
    /// Tags for categorization.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Example requests the skill understands.
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Capabilities advertised by an A2A agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Whether the agent supports `message/stream`.
    #[serde(default)]
    pub streaming: bool,
    /// Whether the agent supports push notifications.
    #[serde(default)]
    pub push_notifications: bool,
}

/// Agent card describing a remote A2A agent's capabilities and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Agent name. Unique among the agents an orchestrator talks to.
    pub name: String,
    /// Agent description.
    #[serde(default)]
    pub description: String,
    /// Agent URL endpoint.
    pub url: String,
    /// Agent version.
    #[serde(default = "default_card_version")]
    pub version: String,
    /// Protocol version.
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    /// Agent capabilities.
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    /// Default input modes.
    #[serde(default)]
    pub default_input_modes: Vec<String>,
    /// Default output modes.
    #[serde(default)]
    pub default_output_modes: Vec<String>,
    /// Agent skills.
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

fn default_card_version() -> String { "1.0.0".to_string() }

// ---------------------------------------------------------------------------
// Message parts
// ---------------------------------------------------------------------------

/// Inline file content, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWithBytes {
    pub bytes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// File content referenced by URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWithUri {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Either flavour of file content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    Bytes(FileWithBytes),
    Uri(FileWithUri),
}

/// A typed content fragment of a message or artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    /// Plain text.
    Text { text: String },
    /// A file, inline or by reference.
    File { file: FileContent },
    /// Structured JSON data.
    Data { data: Value },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a data part.
    pub fn data(data: Value) -> Self {
        Self::Data { data }
    }

    /// Text carried by this part, if any.
    ///
    /// Inline `text/*` files are decoded so their content is readable by
    /// the reasoning engine; anything else yields `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text { text } => Some(text.clone()),
            Self::File { file: FileContent::Bytes(file) } => {
                let is_text = file
                    .mime_type
                    .as_deref()
                    .map(|m| m.starts_with("text/"))
                    .unwrap_or(false);
                if !is_text {
                    return None;
                }
                base64::engine::general_purpose::STANDARD
                    .decode(&file.bytes)
                    .ok()
                    .and_then(|raw| String::from_utf8(raw).ok())
            }
            Self::File { .. } | Self::Data { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// A message in the A2A protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Role of the message sender.
    pub role: Role,
    /// Unique message identifier.
    #[serde(default)]
    pub message_id: String,
    /// Task this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Conversation this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Message parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a message with a fresh message ID.
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            message_id: Uuid::new_v4().to_string(),
            task_id: None,
            context_id: None,
            parts,
        }
    }

    /// A single-part user text message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// A single-part agent text message.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, vec![Part::text(text)])
    }

    /// Builder: tag the message with task and context identifiers.
    pub fn with_ids(mut self, task_id: impl Into<String>, context_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self.context_id = Some(context_id.into());
        self
    }

    /// All text content joined by newlines.
    pub fn text(&self) -> String {
        parts_text(&self.parts)
    }
}

/// Join the textual content of a list of parts with newlines.
pub fn parts_text(parts: &[Part]) -> String {
    parts
        .iter()
        .filter_map(Part::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Submitted,
    Working,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// Whether no further transitions are allowed from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// `submitted -> working -> working* -> {completed | failed | canceled}`.
    /// Failure and cancellation are also reachable directly from
    /// `submitted`, for tasks that break before work starts.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Submitted, Working) => true,
            (Submitted, Failed) | (Submitted, Canceled) => true,
            (Working, Working) | (Working, Completed) | (Working, Failed) | (Working, Canceled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        write!(f, "{}", s)
    }
}

/// Status of an A2A task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// Current state.
    pub state: TaskState,
    /// Status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// RFC 3339 timestamp of the last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskStatus {
    /// A status stamped with the current time.
    pub fn now(state: TaskState, message: Option<Message>) -> Self {
        Self {
            state,
            message,
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }
}

/// The final payload produced by a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Artifact {
    /// Create an artifact with a fresh ID.
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            artifact_id: Uuid::new_v4().to_string(),
            name: None,
            parts,
        }
    }

    /// Builder: name the artifact.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// One unit of delegated work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task ID.
    pub id: String,
    /// Context ID for multi-turn conversations.
    pub context_id: String,
    /// Current task status.
    pub status: TaskStatus,
    /// Messages exchanged while the task ran.
    #[serde(default)]
    pub history: Vec<Message>,
    /// Task outputs.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// A freshly submitted task whose history starts with `message`.
    pub fn submitted(id: impl Into<String>, context_id: impl Into<String>, message: Message) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::now(TaskState::Submitted, None),
            history: vec![message],
            artifacts: Vec::new(),
        }
    }

    /// Whether the task reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Apply a streamed event to this task snapshot.
    ///
    /// Returns `false` (and leaves the task untouched) when the event is an
    /// illegal transition, including anything after a terminal state.
    pub fn apply(&mut self, event: &TaskEvent) -> bool {
        let current = self.status.state;
        // submitted is announced once at creation; re-announcing it is a no-op
        let same_submitted = current == TaskState::Submitted && event.state == TaskState::Submitted;
        if !same_submitted && !current.can_transition_to(event.state) {
            return false;
        }
        if let Some(ref message) = event.message {
            self.history.push(message.clone());
        }
        if let Some(ref artifact) = event.artifact {
            self.artifacts.push(artifact.clone());
        }
        self.status = TaskStatus {
            state: event.state,
            message: event.message.clone(),
            timestamp: Some(event.timestamp.clone()),
        };
        true
    }

    /// Text of every artifact part, joined by newlines.
    pub fn artifact_text(&self) -> String {
        self.artifacts
            .iter()
            .map(|a| parts_text(&a.parts))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Streaming events
// ---------------------------------------------------------------------------

/// One element of a task's streaming status channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: String,
    pub context_id: String,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    /// Set on the single terminal event of the stream.
    #[serde(rename = "final", default)]
    pub is_final: bool,
    pub timestamp: String,
}

impl TaskEvent {
    /// Build an event; `is_final` is derived from the state.
    pub fn new(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        state: TaskState,
        message: Option<Message>,
        artifact: Option<Artifact>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            state,
            message,
            artifact,
            is_final: state.is_terminal(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
