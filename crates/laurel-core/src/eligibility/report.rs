//! Eligibility verdicts and diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::providers::StudentRef;

/// Derived pass/fail verdict for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalResult {
    /// The student graduates.
    Pass,

    /// The student does not graduate.
    Fail,
}

impl FinalResult {
    /// Returns the verdict as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }

    /// Parses a verdict from its string identifier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }

    /// Returns `true` for a passing verdict.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for FinalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A disqualifying finding for one student in one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EligibilityIssue {
    /// No result row was recorded for the subject.
    MissingResult,

    /// The student was marked absent.
    Absent,

    /// Marks obtained fell below the subject's passing marks.
    BelowPassing,
}

impl EligibilityIssue {
    /// Returns the issue as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingResult => "missing_result",
            Self::Absent => "absent",
            Self::BelowPassing => "below_passing",
        }
    }
}

impl fmt::Display for EligibilityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An issue tied to the subject it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectIssue {
    /// The subject the issue was found in.
    pub subject_id: String,

    /// The finding.
    pub issue: EligibilityIssue,
}

/// Diagnostics backing one student's verdict.
///
/// Serialized as-is into the snapshot row's `eligibility_json` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EligibilityReport {
    /// Disqualifying findings, empty for a clean pass.
    pub issues: Vec<SubjectIssue>,

    /// `obtained / possible * 100`, when any graded subject was in scope.
    pub percentage: Option<f64>,

    /// The grade policy's verdict at the percentage level. `None` means
    /// no grading configuration constrained the result.
    pub grade_pass: Option<bool>,

    /// Sum of marks obtained across graded subjects.
    pub total_obtained: f64,

    /// Sum of total marks across graded subjects.
    pub total_possible: f64,
}

impl EligibilityReport {
    /// Returns `true` when the report carries no disqualifying findings
    /// and the grade policy did not veto the result.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.issues.is_empty() && self.grade_pass != Some(false)
    }
}

/// One row of evaluator output: a resolved student plus verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentEligibility {
    /// The resolved student identity.
    pub student: StudentRef,

    /// Derived verdict.
    pub final_result: FinalResult,

    /// Rank among passing students (1-based), assigned by descending
    /// percentage; `None` for failing students or when no percentage was
    /// computable.
    pub position: Option<u32>,

    /// Diagnostics backing the verdict.
    pub report: EligibilityReport,
}
