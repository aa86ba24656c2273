use serde::{Deserialize, Serialize};

use super::task::{CodingLevel, TheoryLevel};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingSolutions {
    pub easy: String,
    pub medium: String,
    pub hard: String,
}

impl CodingSolutions {
    pub fn set(&mut self, level: CodingLevel, solution: impl Into<String>) {
        let slot = match level {
            CodingLevel::Easy => &mut self.easy,
            CodingLevel::Medium => &mut self.medium,
            CodingLevel::Hard => &mut self.hard,
        };
        *slot = solution.into();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheorySolutions {
    pub easy: String,
    pub hard: String,
}

impl TheorySolutions {
    pub fn set(&mut self, level: TheoryLevel, answer: impl Into<String>) {
        let slot = match level {
            TheoryLevel::Easy => &mut self.easy,
            TheoryLevel::Hard => &mut self.hard,
        };
        *slot = answer.into();
    }
}

/// Fixed-shape body of the final submission. `Default` is the forfeited
/// (all-empty) payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub coding_solutions: CodingSolutions,
    pub theory_solutions: TheorySolutions,
}

impl SubmissionPayload {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Opaque backend response handed over to the report view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionResult(pub serde_json::Value);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionTrigger {
    Manual,
    Timeout,
    Violation,
}

impl SubmissionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionTrigger::Manual => "manual",
            SubmissionTrigger::Timeout => "timeout",
            SubmissionTrigger::Violation => "violation",
        }
    }
}
