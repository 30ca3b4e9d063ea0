//! A2A configuration types.

use serde::{Deserialize, Serialize};

use super::types::{AgentCapabilities, AgentCard, AgentSkill, ProtocolVersion};

/// Configuration for connecting to remote A2A agents (client side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2AClientConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Path of the agent card, relative to the agent's base URL.
    #[serde(default = "default_agent_card_path")]
    pub agent_card_path: String,
    /// Path of the JSON-RPC endpoint, relative to the agent's base URL.
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
}

fn default_timeout() -> u64 { 30 }
fn default_agent_card_path() -> String { "/.well-known/agent-card.json".to_string() }
fn default_rpc_path() -> String { "/".to_string() }

impl Default for A2AClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            agent_card_path: default_agent_card_path(),
            rpc_path: default_rpc_path(),
        }
    }
}

/// Configuration for exposing an agent as an A2A server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2AServerConfig {
    /// Human-readable name for the agent.
    pub name: String,
    /// Human-readable description of the agent.
    #[serde(default)]
    pub description: String,
    /// Version string for the agent card.
    #[serde(default = "default_version")]
    pub version: String,
    /// Public URL of the agent.
    pub url: String,
    /// Default supported input MIME types.
    #[serde(default = "default_mime_types")]
    pub default_input_modes: Vec<String>,
    /// Default supported output MIME types.
    #[serde(default = "default_mime_types")]
    pub default_output_modes: Vec<String>,
    /// Skills published on the card.
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
    /// Path the JSON-RPC endpoint is mounted on.
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
}

fn default_version() -> String { "1.0.0".to_string() }
fn default_mime_types() -> Vec<String> { vec!["text/plain".to_string()] }

impl A2AServerConfig {
    /// Create a config with defaults for everything but the identity.
    pub fn new(name: impl Into<String>, description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: default_version(),
            url: url.into(),
            default_input_modes: default_mime_types(),
            default_output_modes: default_mime_types(),
            skills: Vec::new(),
            rpc_path: default_rpc_path(),
        }
    }

    /// Builder: add a skill.
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// The agent card this server publishes.
    pub fn agent_card(&self) -> AgentCard {
        AgentCard {
            name: self.name.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            version: self.version.clone(),
            protocol_version: ProtocolVersion::default(),
            capabilities: AgentCapabilities {
                streaming: true,
                push_notifications: false,
            },
            default_input_modes: self.default_input_modes.clone(),
            default_output_modes: self.default_output_modes.clone(),
            skills: self.skills.clone(),
        }
    }
}
