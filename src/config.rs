//! Runtime configuration.
//!
//! Config structs deserialize from YAML with per-field defaults; the
//! `server` binary then applies environment overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::a2a::config::A2AClientConfig;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

// ---------------------------------------------------------------------------
// Remote agents
// ---------------------------------------------------------------------------

/// One configured remote agent address.
///
/// Accepts either a bare URL or `{url, name}` in YAML. The optional name is
/// only used to label the agent while it is unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RemoteAgentSpec")]
pub struct RemoteAgent {
    pub url: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RemoteAgentSpec {
    Url(String),
    Detailed { url: String, name: Option<String> },
}

impl From<RemoteAgentSpec> for RemoteAgent {
    fn from(spec: RemoteAgentSpec) -> Self {
        match spec {
            RemoteAgentSpec::Url(url) => Self { url, name: None },
            RemoteAgentSpec::Detailed { url, name } => Self { url, name },
        }
    }
}

impl RemoteAgent {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), name: None }
    }

    pub fn named(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: Some(name.into()),
        }
    }
}

fn default_remote_agents() -> Vec<RemoteAgent> {
    vec![
        RemoteAgent::named("http://localhost:10002", "check_budget_agent"),
        RemoteAgent::named("http://localhost:10003", "check_planning_agent"),
        RemoteAgent::named("http://localhost:10004", "check_legal_agent"),
    ]
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// What to do with agents that did not answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailablePolicy {
    /// Decide on the votes received and list the missing agents.
    #[default]
    Disclose,
    /// Any missing agent makes the decision indeterminate.
    Escalate,
}

/// Configuration for the financial orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Name published on the orchestrator's own agent card.
    #[serde(default = "default_orchestrator_name")]
    pub name: String,
    /// Remote check agents to delegate to.
    #[serde(default = "default_remote_agents")]
    pub remote_agents: Vec<RemoteAgent>,
    /// Upper bound on each delegated call, in seconds.
    #[serde(default = "default_delegation_timeout")]
    pub delegation_timeout_secs: f64,
    /// Upper bound on each agent card fetch, in seconds.
    #[serde(default = "default_card_timeout")]
    pub card_timeout_secs: u64,
    /// Policy for agents that did not answer.
    #[serde(default)]
    pub unavailable_policy: UnavailablePolicy,
}

fn default_orchestrator_name() -> String { "financial_orchestrator".to_string() }
fn default_delegation_timeout() -> f64 { 30.0 }
fn default_card_timeout() -> u64 { 30 }

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: default_orchestrator_name(),
            remote_agents: default_remote_agents(),
            delegation_timeout_secs: default_delegation_timeout(),
            card_timeout_secs: default_card_timeout(),
            unavailable_policy: UnavailablePolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `REMOTE_AGENTS` (comma separated URLs),
    /// `DELEGATION_TIMEOUT_SECS` and `UNAVAILABLE_POLICY` overrides.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup("REMOTE_AGENTS") {
            self.remote_agents = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(RemoteAgent::new)
                .collect();
        }
        if let Some(raw) = lookup("DELEGATION_TIMEOUT_SECS") {
            self.delegation_timeout_secs = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DELEGATION_TIMEOUT_SECS".into(),
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("UNAVAILABLE_POLICY") {
            self.unavailable_policy = match raw.to_lowercase().as_str() {
                "disclose" => UnavailablePolicy::Disclose,
                "escalate" => UnavailablePolicy::Escalate,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "UNAVAILABLE_POLICY".into(),
                        value: raw,
                    })
                }
            };
        }
        self.validate()
    }

    /// The delegation timeout must be a positive, representable duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.delegation_timeout_secs;
        if !t.is_finite() || t <= 0.0 || Duration::try_from_secs_f64(t).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "delegation_timeout_secs".into(),
                value: t.to_string(),
            });
        }
        Ok(())
    }

    /// Saturates at `Duration::MAX` for values `validate` would refuse.
    pub fn delegation_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.delegation_timeout_secs).unwrap_or(Duration::MAX)
    }

    /// Client settings for card fetches and delegated calls.
    ///
    /// The HTTP timeout is never shorter than the delegation timeout, so the
    /// orchestrator's own timer is the one that fires.
    pub fn client_config(&self) -> A2AClientConfig {
        let delegation = self.delegation_timeout_secs.ceil() as u64;
        A2AClientConfig {
            timeout_secs: self.card_timeout_secs.max(delegation).max(1),
            ..A2AClientConfig::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Server process
// ---------------------------------------------------------------------------

/// Which agent a `server` process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Orchestrator,
    Budget,
    Planning,
    Legal,
}

impl AgentRole {
    pub fn default_port(self) -> u16 {
        match self {
            Self::Orchestrator => 10001,
            Self::Budget => 10002,
            Self::Planning => 10003,
            Self::Legal => 10004,
        }
    }
}

impl std::str::FromStr for AgentRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "orchestrator" | "host" => Ok(Self::Orchestrator),
            "budget" | "check_budget_agent" => Ok(Self::Budget),
            "planning" | "check_planning_agent" => Ok(Self::Planning),
            "legal" | "check_legal_agent" => Ok(Self::Legal),
            _ => Err(ConfigError::InvalidValue {
                key: "AGENT_ROLE".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// Process-level settings of the `server` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub role: AgentRole,
    pub host: String,
    pub port: u16,
    /// URL published on the agent card.
    pub public_url: String,
    /// Optional orchestrator YAML config.
    pub config_path: Option<PathBuf>,
    /// File holding the current budget (budget agent).
    pub budget_file: PathBuf,
    /// Expense ledger CSV (planning and legal agents).
    pub expenses_file: PathBuf,
}

impl ServerSettings {
    /// Read `AGENT_ROLE`, `HOST`, `PORT`, `PUBLIC_URL`, `CONFIG_PATH`,
    /// `BUDGET_FILE` and `EXPENSES_FILE`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let role: AgentRole = lookup("AGENT_ROLE")
            .unwrap_or_else(|| "orchestrator".to_string())
            .parse()?;
        let host = lookup("HOST").unwrap_or_else(|| "localhost".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                value: raw.clone(),
            })?,
            None => role.default_port(),
        };
        let public_url = lookup("PUBLIC_URL").unwrap_or_else(|| format!("http://{}:{}/", host, port));
        Ok(Self {
            role,
            host,
            port,
            public_url,
            config_path: lookup("CONFIG_PATH").map(PathBuf::from),
            budget_file: lookup("BUDGET_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("database/current_budget.txt")),
            expenses_file: lookup("EXPENSES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("database/expenses.csv")),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
