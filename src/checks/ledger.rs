//! Expense ledger lookups: planning and legal approval.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use serde_json::Value;

use super::{CheckError, CheckOutcome, ExpenseRequest};
use crate::error::OrchestrationError;
use crate::reasoning::Tool;

/// One row of `department,amount,supplier,approved_by_legal`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerEntry {
    pub department: String,
    pub amount: f64,
    pub supplier: String,
    #[serde(default)]
    pub approved_by_legal: String,
}

impl LedgerEntry {
    fn matches(&self, department: &str, amount: f64, supplier: &str) -> bool {
        self.department.to_lowercase() == department.to_lowercase()
            && self.supplier.to_lowercase() == supplier.to_lowercase()
            && (self.amount - amount).abs() < 1e-6
    }

    pub fn is_legally_approved(&self) -> bool {
        self.approved_by_legal.trim().eq_ignore_ascii_case("yes")
    }
}

/// The planned expenses.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Parse CSV with a header row.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, CheckError> {
        let mut reader = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(reader);
        let entries = reader.deserialize().collect::<Result<Vec<LedgerEntry>, _>>()?;
        Ok(Self { entries })
    }

    pub async fn load(path: &Path) -> Result<Self, CheckError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| CheckError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(bytes.as_slice())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Entries matching department and supplier (case-insensitive) and the exact amount.
    pub fn matching<'a>(&'a self, department: &'a str, amount: f64, supplier: &'a str) -> impl Iterator<Item = &'a LedgerEntry> {
        self.entries
            .iter()
            .filter(move |e| e.matches(department, amount, supplier))
    }
}

/// The three facts a ledger lookup needs.
fn ledger_key(request: &ExpenseRequest) -> Result<(&str, f64, &str), CheckError> {
    let department = request.department.as_deref().ok_or(CheckError::MissingField("department"))?;
    let amount = request.amount.ok_or(CheckError::MissingField("amount"))?;
    let supplier = request.supplier.as_deref().ok_or(CheckError::MissingField("supplier"))?;
    Ok((department, amount, supplier))
}

/// Planned iff the ledger holds a matching entry. An unreadable ledger
/// counts as not planned.
pub async fn check_planned_expense(ledger_file: &Path, request: &ExpenseRequest) -> Result<CheckOutcome, CheckError> {
    let (department, amount, supplier) = ledger_key(request)?;
    log::debug!("Checking planned expense: {}, {:.2}, {}", department, amount, supplier);

    let ledger = match Ledger::load(ledger_file).await {
        Ok(ledger) => ledger,
        Err(e) => {
            log::warn!("Error checking planned expense: {}", e);
            return Ok(CheckOutcome::reject(format!("Expense was not planned: {}", e)));
        }
    };
    Ok(if ledger.matching(department, amount, supplier).next().is_some() {
        CheckOutcome::approve(format!("Expense was planned ({})", request.describe()))
    } else {
        CheckOutcome::reject(format!("Expense was not planned ({})", request.describe()))
    })
}

/// Approved iff a matching ledger entry is marked `approved_by_legal = yes`.
pub async fn check_legal_approval(ledger_file: &Path, request: &ExpenseRequest) -> Result<CheckOutcome, CheckError> {
    let (department, amount, supplier) = ledger_key(request)?;

    let ledger = match Ledger::load(ledger_file).await {
        Ok(ledger) => ledger,
        Err(e) => {
            log::warn!("Error checking legal approval: {}", e);
            return Ok(CheckOutcome::reject(format!("Not approved by legal: {}", e)));
        }
    };
    Ok(if ledger.matching(department, amount, supplier).any(LedgerEntry::is_legally_approved) {
        CheckOutcome::approve(format!("Approved by legal ({})", request.describe()))
    } else {
        CheckOutcome::reject(format!("Not approved by legal ({})", request.describe()))
    })
}

fn request_from_args(tool: &str, args: &Value) -> Result<ExpenseRequest, OrchestrationError> {
    serde_json::from_value(args.clone())
        .map_err(|e| OrchestrationError::computation(format!("invalid {} arguments: {}", tool, e)))
}

fn render(outcome: Result<CheckOutcome, CheckError>) -> Result<String, OrchestrationError> {
    let outcome = outcome.map_err(|e| OrchestrationError::computation(e.to_string()))?;
    serde_json::to_string(&outcome).map_err(|e| OrchestrationError::computation(e.to_string()))
}

/// `check_planned_expense` tool.
#[derive(Debug, Clone)]
pub struct PlanningTool {
    ledger_file: PathBuf,
}

impl PlanningTool {
    pub fn new(ledger_file: impl Into<PathBuf>) -> Self {
        Self {
            ledger_file: ledger_file.into(),
        }
    }
}

#[async_trait]
impl Tool for PlanningTool {
    fn name(&self) -> &str {
        "check_planned_expense"
    }

    fn description(&self) -> &str {
        "Checks whether an expense (department, amount, supplier) is planned in the budget."
    }

    async fn call(&self, args: &Value) -> Result<String, OrchestrationError> {
        let request = request_from_args(self.name(), args)?;
        render(check_planned_expense(&self.ledger_file, &request).await)
    }
}

/// `check_legal_approval` tool.
#[derive(Debug, Clone)]
pub struct LegalTool {
    ledger_file: PathBuf,
}

impl LegalTool {
    pub fn new(ledger_file: impl Into<PathBuf>) -> Self {
        Self {
            ledger_file: ledger_file.into(),
        }
    }
}

#[async_trait]
impl Tool for LegalTool {
    fn name(&self) -> &str {
        "check_legal_approval"
    }

    fn description(&self) -> &str {
        "Checks whether an expense (department, amount, supplier) was approved by the legal department."
    }

    async fn call(&self, args: &Value) -> Result<String, OrchestrationError> {
        let request = request_from_args(self.name(), args)?;
        render(check_legal_approval(&self.ledger_file, &request).await)
    }
}
