//! Verdict parsing and the aggregation rule.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::a2a::{parts_text, Part, Task, TaskState};
use crate::config::UnavailablePolicy;
use crate::error::OrchestrationError;

/// One agent's approve/reject outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub agent: String,
    pub approved: bool,
    pub rationale: String,
}

/// An agent that did not vote this round, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unavailable {
    pub agent: String,
    pub reason: String,
}

/// The business decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    /// Nobody voted; neither approval nor rejection is implied.
    NoChecksPerformed,
    /// Some agents did not vote and the policy refuses to decide without them.
    Indeterminate,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NoChecksPerformed => "no checks performed",
            Self::Indeterminate => "indeterminate",
        })
    }
}

/// Decision plus everything needed to audit it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedDecision {
    pub decision: Decision,
    pub approved: bool,
    pub verdicts: Vec<Verdict>,
    pub unavailable: Vec<Unavailable>,
}

/// Combine the votes that arrived.
///
/// Approved iff at least one agent voted and every vote approves. A single
/// rejection rejects. Agents in `unavailable` do not vote; under
/// [`UnavailablePolicy::Escalate`] their absence turns an otherwise
/// approving round into [`Decision::Indeterminate`].
pub fn aggregate(mut verdicts: Vec<Verdict>, mut unavailable: Vec<Unavailable>, policy: UnavailablePolicy) -> AggregatedDecision {
    verdicts.sort_by(|a, b| a.agent.cmp(&b.agent));
    unavailable.sort_by(|a, b| a.agent.cmp(&b.agent));

    let decision = if verdicts.is_empty() {
        Decision::NoChecksPerformed
    } else if verdicts.iter().any(|v| !v.approved) {
        Decision::Rejected
    } else if policy == UnavailablePolicy::Escalate && !unavailable.is_empty() {
        Decision::Indeterminate
    } else {
        Decision::Approved
    };

    AggregatedDecision {
        approved: decision == Decision::Approved,
        decision,
        verdicts,
        unavailable,
    }
}

impl AggregatedDecision {
    /// Human-readable rationale listing every vote and every missing agent.
    pub fn rationale(&self) -> String {
        let headline = match self.decision {
            Decision::Approved => "✅ Approved",
            Decision::Rejected => "❌ Rejected",
            Decision::NoChecksPerformed => "⚠️ No checks performed",
            Decision::Indeterminate => "⚠️ Indeterminate",
        };
        let mut out = format!("**Decision: {}**\n", headline);

        if self.verdicts.is_empty() {
            out.push_str("\nNo checks performed: no remote agent returned a verdict, so the expense is neither approved nor rejected.\n");
        } else {
            out.push_str("\nChecks:\n");
            for v in &self.verdicts {
                let mark = if v.approved { "✅" } else { "❌" };
                out.push_str(&format!("- {} {}: {}\n", mark, v.agent, v.rationale));
            }
        }

        if !self.unavailable.is_empty() {
            out.push_str("\nUnavailable (not counted):\n");
            for u in &self.unavailable {
                out.push_str(&format!("- {}: {}\n", u.agent, u.reason));
            }
        }
        if self.decision == Decision::Indeterminate {
            out.push_str("\nThe expense needs a decision once every agent can be consulted.\n");
        }
        out
    }

    /// Artifact parts: the rationale and the structured decision.
    pub fn to_parts(&self) -> Vec<Part> {
        let mut parts = vec![Part::text(self.rationale())];
        if let Ok(data) = serde_json::to_value(self) {
            parts.push(Part::data(data));
        }
        parts
    }
}

const REJECT_MARKERS: &[&str] = &[
    "not approved",
    "não aprovado",
    "no budget",
    "não tem budget",
    "not planned",
    "não foi planejada",
    "rejected",
    "denied",
    "❌",
];
const APPROVE_MARKERS: &[&str] = &[
    "approved",
    "aprovado",
    "budget available",
    "tem budget",
    "was planned",
    "foi planejada",
    "✅",
];

/// Interpret a remote agent's terminal task as a vote.
///
/// A `data` part with a boolean `approved` wins; otherwise the artifact text
/// is matched against known answers. Anything else is a malformed response.
pub fn parse_verdict(agent: &str, task: &Task) -> Result<Verdict, OrchestrationError> {
    let malformed = |reason: String| OrchestrationError::MalformedResponse {
        agent: agent.to_string(),
        reason,
    };

    if task.status.state != TaskState::Completed {
        let detail = task.status.message.as_ref().map(|m| m.text()).unwrap_or_default();
        return Err(malformed(format!("task ended as {} {}", task.status.state, detail).trim_end().to_string()));
    }
    if task.artifacts.is_empty() {
        return Err(malformed("completed task has no artifact".to_string()));
    }

    let text = task.artifact_text();
    let structured = task
        .artifacts
        .iter()
        .flat_map(|a| a.parts.iter())
        .find_map(|part| match part {
            Part::Data { data } => data.get("approved").and_then(Value::as_bool).map(|ok| (ok, data)),
            _ => None,
        });
    if let Some((approved, data)) = structured {
        let rationale = data
            .get("rationale")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(text);
        return Ok(Verdict {
            agent: agent.to_string(),
            approved,
            rationale,
        });
    }

    let lowered = text.to_lowercase();
    let approved = if REJECT_MARKERS.iter().any(|m| lowered.contains(m)) {
        false
    } else if APPROVE_MARKERS.iter().any(|m| lowered.contains(m)) {
        true
    } else {
        return Err(malformed(format!("no verdict in answer: {:?}", parts_text(&task.artifacts[0].parts))));
    };
    Ok(Verdict {
        agent: agent.to_string(),
        approved,
        rationale: text,
    })
}
