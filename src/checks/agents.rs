//! Agent definitions for the three check agents.

use std::path::PathBuf;
use std::sync::Arc;

use crate::a2a::config::A2AServerConfig;
use crate::a2a::AgentSkill;
use crate::reasoning::{ExpenseCheckReasoner, Tool, ToolCallingExecutor};
use crate::sessions::SessionStore;

use super::{BudgetTool, LegalTool, PlanningTool};

/// Which business check an agent performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Budget,
    Planning,
    Legal,
}

impl CheckKind {
    pub const ALL: [CheckKind; 3] = [CheckKind::Budget, CheckKind::Planning, CheckKind::Legal];

    /// Name published on the agent card.
    pub fn agent_name(self) -> &'static str {
        match self {
            Self::Budget => "check_budget_agent",
            Self::Planning => "check_planning_agent",
            Self::Legal => "check_legal_agent",
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Budget => "check_budget",
            Self::Planning => "check_planned_expense",
            Self::Legal => "check_legal_approval",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Budget => "An agent that checks whether there is budget available for a requested amount.",
            Self::Planning => "An agent that checks whether specific expenses are planned in the budget.",
            Self::Legal => "An agent that checks whether specific expenses were approved by the legal department.",
        }
    }

    /// Instruction handed to the reasoning engine.
    pub fn instruction(self) -> String {
        format!(
            "Role: {}\nUse the `{}` tool to answer. Only help with this check.",
            self.description(),
            self.tool_name()
        )
    }

    pub fn skill(self) -> AgentSkill {
        let (name, description, tags, example) = match self {
            Self::Budget => (
                "Check Budget",
                "Checks whether there is budget available for a given amount.",
                vec!["finance", "budget"],
                "Is there budget available for R$ 2.500?",
            ),
            Self::Planning => (
                "Check Planned Expense",
                "Checks whether an expense for a department and supplier is planned.",
                vec!["finance", "planning"],
                "Is the R$ 2.500 expense of the Marketing department with supplier XYZ Agency planned?",
            ),
            Self::Legal => (
                "Check Legal Approval",
                "Checks whether an expense was approved by the legal department.",
                vec!["finance", "legal"],
                "Was the R$ 2.500 expense of the Marketing department with supplier XYZ Agency approved by legal?",
            ),
        };
        AgentSkill {
            id: self.agent_name().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            tags: tags.into_iter().map(String::from).collect(),
            examples: vec![example.to_string()],
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.agent_name())
    }
}

/// Everything needed to serve one check agent.
#[derive(Debug, Clone)]
pub struct CheckAgent {
    pub kind: CheckKind,
    /// Public URL published on the card.
    pub url: String,
    pub budget_file: PathBuf,
    pub expenses_file: PathBuf,
}

impl CheckAgent {
    pub fn new(kind: CheckKind, url: impl Into<String>, budget_file: impl Into<PathBuf>, expenses_file: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            url: url.into(),
            budget_file: budget_file.into(),
            expenses_file: expenses_file.into(),
        }
    }

    pub fn server_config(&self) -> A2AServerConfig {
        A2AServerConfig::new(self.kind.agent_name(), self.kind.description(), self.url.clone()).with_skill(self.kind.skill())
    }

    pub fn tool(&self) -> Arc<dyn Tool> {
        match self.kind {
            CheckKind::Budget => Arc::new(BudgetTool::new(self.budget_file.clone())),
            CheckKind::Planning => Arc::new(PlanningTool::new(self.expenses_file.clone())),
            CheckKind::Legal => Arc::new(LegalTool::new(self.expenses_file.clone())),
        }
    }

    pub fn executor(&self, sessions: Arc<dyn SessionStore>) -> ToolCallingExecutor {
        let engine = Arc::new(ExpenseCheckReasoner::new(self.kind.tool_name()));
        ToolCallingExecutor::new(self.kind.instruction(), engine, sessions).with_tool(self.tool())
    }
}
