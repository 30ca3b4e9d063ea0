//! Business checks behind the remote check agents.
//!
//! Each check agent wraps one tool: the budget check reads the current
//! budget from a file, the planning and legal checks look the expense up
//! in a CSV ledger. Every check produces a [`CheckOutcome`], which the agent
//! publishes both as text and as a structured `data` part.

pub mod agents;
pub mod budget;
pub mod ledger;
pub mod request;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use agents::{CheckAgent, CheckKind};
pub use budget::BudgetTool;
pub use ledger::{Ledger, LedgerEntry, LegalTool, PlanningTool};
pub use request::ExpenseRequest;

/// Result of one business check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub approved: bool,
    pub rationale: String,
}

impl CheckOutcome {
    pub fn approve(rationale: impl Into<String>) -> Self {
        Self {
            approved: true,
            rationale: rationale.into(),
        }
    }

    pub fn reject(rationale: impl Into<String>) -> Self {
        Self {
            approved: false,
            rationale: rationale.into(),
        }
    }
}

/// Errors raised by the check data sources.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} does not hold a number: {value:?}")]
    InvalidBudget { path: PathBuf, value: String },

    #[error("invalid expense ledger: {0}")]
    Csv(#[from] csv::Error),

    #[error("the request does not mention the {0}")]
    MissingField(&'static str),
}
