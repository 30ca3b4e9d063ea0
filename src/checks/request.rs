//! Free-text expense request parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CURRENCY_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:R\$|US\$|\$|USD|BRL)\s*([0-9][0-9.,]*)").unwrap());
static LABELED_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:amount|value|valor)\s*(?:of|de|:)?\s*([0-9][0-9.,]*)").unwrap());
static DEPARTMENT_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:department|departamento|dept\.?)\s+(?:(?i:of|de|do|da)\s+)?(\p{Lu}[\p{L}\p{N}&-]*)").unwrap()
});
static DEPARTMENT_BEFORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Lu}[\p{L}\p{N}&-]*)\s+(?i:department)").unwrap());
static SUPPLIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?i:supplier|vendor|fornecedor|with|com)\s+(?:(?i:the|a|o)\s+)?(\p{Lu}[\p{L}\p{N}&.-]*(?:\s+\p{Lu}[\p{L}\p{N}&.-]*)*)",
    )
    .unwrap()
});

/// The facts a check needs, extracted from a natural-language request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
}

impl ExpenseRequest {
    /// Extract whatever can be found in `text`; missing facts stay `None`.
    pub fn parse(text: &str) -> Self {
        let amount = CURRENCY_AMOUNT
            .captures(text)
            .or_else(|| LABELED_AMOUNT.captures(text))
            .and_then(|c| parse_amount(&c[1]));
        let department = DEPARTMENT_AFTER
            .captures(text)
            .or_else(|| DEPARTMENT_BEFORE.captures(text))
            .map(|c| clean(&c[1]));
        let supplier = SUPPLIER.captures(text).map(|c| clean(&c[1]));

        Self {
            department,
            amount,
            supplier,
        }
    }

    /// One-line description used in rationales.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(amount) = self.amount {
            parts.push(format!("amount {:.2}", amount));
        }
        if let Some(ref d) = self.department {
            parts.push(format!("department {}", d));
        }
        if let Some(ref s) = self.supplier {
            parts.push(format!("supplier {}", s));
        }
        if parts.is_empty() {
            "an unspecified expense".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn clean(raw: &str) -> String {
    raw.trim().trim_end_matches(['.', ',', '?', '!', ';', ':']).to_string()
}

/// Parse `2.500`, `2,500.75`, `1.200,50` or `99.9`.
///
/// When both separators appear the last one is the decimal point. A lone
/// separator followed by exactly three digits groups thousands.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_end_matches(['.', ',']);
    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(d), Some(c)) if d > c => raw.replace(',', ""),
        (Some(_), Some(_)) => raw.replace('.', "").replace(',', "."),
        (Some(_), None) => normalize_single(raw, '.'),
        (None, Some(_)) => normalize_single(raw, ','),
        (None, None) => raw.to_string(),
    };
    normalized.parse().ok()
}

fn normalize_single(raw: &str, sep: char) -> String {
    let groups: Vec<&str> = raw.split(sep).collect();
    let thousands = groups.len() > 2 || groups.last().map_or(false, |g| g.len() == 3);
    if thousands {
        groups.concat()
    } else {
        raw.replace(sep, ".")
    }
}
