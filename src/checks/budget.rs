//! Budget availability check.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::{CheckError, CheckOutcome, ExpenseRequest};
use crate::error::OrchestrationError;
use crate::reasoning::Tool;

/// Read the current budget, a single number in a text file.
pub async fn read_budget(path: &Path) -> Result<f64, CheckError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|source| CheckError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    raw.trim().parse().map_err(|_| CheckError::InvalidBudget {
        path: path.to_path_buf(),
        value: raw.trim().to_string(),
    })
}

/// Approve iff the current budget covers `amount`.
///
/// An unreadable budget counts as no budget available.
pub async fn check_budget(path: &Path, amount: f64) -> CheckOutcome {
    match read_budget(path).await {
        Ok(budget) if budget >= amount => {
            CheckOutcome::approve(format!("Budget available: {:.2} covers the requested {:.2}", budget, amount))
        }
        Ok(budget) => CheckOutcome::reject(format!(
            "No budget available: {:.2} does not cover the requested {:.2}",
            budget, amount
        )),
        Err(e) => {
            log::warn!("Error checking budget: {}", e);
            CheckOutcome::reject(format!("No budget available: {}", e))
        }
    }
}

/// `check_budget` tool.
#[derive(Debug, Clone)]
pub struct BudgetTool {
    budget_file: PathBuf,
}

impl BudgetTool {
    pub fn new(budget_file: impl Into<PathBuf>) -> Self {
        Self {
            budget_file: budget_file.into(),
        }
    }
}

#[async_trait]
impl Tool for BudgetTool {
    fn name(&self) -> &str {
        "check_budget"
    }

    fn description(&self) -> &str {
        "Checks whether there is budget available for the requested amount."
    }

    async fn call(&self, args: &Value) -> Result<String, OrchestrationError> {
        let request: ExpenseRequest = serde_json::from_value(args.clone())
            .map_err(|e| OrchestrationError::computation(format!("invalid check_budget arguments: {}", e)))?;
        let amount = request
            .amount
            .ok_or_else(|| OrchestrationError::computation(CheckError::MissingField("amount").to_string()))?;

        let outcome = check_budget(&self.budget_file, amount).await;
        serde_json::to_string(&outcome).map_err(|e| OrchestrationError::computation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn budget_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[tokio::test]
    async fn test_budget_covers_amount() {
        let file = budget_file("10000\n");
        assert!(check_budget(file.path(), 2500.0).await.approved);
        assert!(check_budget(file.path(), 10000.0).await.approved);
        assert!(!check_budget(file.path(), 10000.01).await.approved);
    }

    #[tokio::test]
    async fn test_unreadable_budget_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = check_budget(&dir.path().join("missing.txt"), 1.0).await;
        assert!(!outcome.approved);

        let file = budget_file("lots");
        assert!(matches!(read_budget(file.path()).await, Err(CheckError::InvalidBudget { .. })));
    }

    #[tokio::test]
    async fn test_tool_requires_amount() {
        let file = budget_file("100");
        let tool = BudgetTool::new(file.path());
        assert!(tool.call(&serde_json::json!({})).await.is_err());

        let out = tool.call(&serde_json::json!({"amount": 50.0})).await.unwrap();
        let outcome: CheckOutcome = serde_json::from_str(&out).unwrap();
        assert!(outcome.approved);
    }
}
