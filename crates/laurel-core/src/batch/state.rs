//! Graduation batch model and lifecycle states.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::eligibility::{EligibilityReport, FinalResult};
use crate::tenant::{ActorId, OrgId, SchoolId};

/// Unique identifier for a graduation batch.
pub type BatchId = String;

/// The lifecycle states of a graduation batch.
///
/// Status only advances forward, never regresses. The single source of
/// truth for legal movement is [`valid_transitions`](Self::valid_transitions);
/// snapshot regeneration is a draft-only self-operation, not a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BatchStatus {
    /// The batch is editable; the eligibility snapshot may be regenerated.
    #[default]
    Draft,

    /// The snapshot is frozen and the batch awaits issuance.
    Approved,

    /// Certificates have been issued (terminal).
    Issued,
}

impl BatchStatus {
    /// Returns `true` if this is the terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Issued)
    }

    /// Returns the status as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Issued => "issued",
        }
    }

    /// Parses a status from its string identifier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "approved" => Some(Self::Approved),
            "issued" => Some(Self::Issued),
            _ => None,
        }
    }

    /// Returns the valid transitions from this state.
    #[must_use]
    pub const fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Approved],
            Self::Approved => &[Self::Issued],
            Self::Issued => &[],
        }
    }

    /// Returns `true` if transitioning to `target` is valid from this state.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload for creating a graduation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    /// Academic year the batch covers (e.g. `"2024-2025"`).
    pub academic_year: String,

    /// Class being graduated.
    pub class_name: String,

    /// The exams whose results feed eligibility. Must be non-empty.
    pub exam_ids: Vec<String>,

    /// Date printed on the certificates.
    pub graduation_date: NaiveDate,
}

/// A graduation batch.
#[derive(Debug, Clone, PartialEq)]
pub struct GraduationBatch {
    /// Unique identifier.
    pub id: BatchId,

    /// Owning organization.
    pub organization_id: OrgId,

    /// Owning school.
    pub school_id: SchoolId,

    /// Academic year the batch covers.
    pub academic_year: String,

    /// Class being graduated.
    pub class_name: String,

    /// The exams whose results feed eligibility.
    pub exam_ids: Vec<String>,

    /// Date printed on the certificates.
    pub graduation_date: NaiveDate,

    /// Current lifecycle state.
    pub status: BatchStatus,

    /// Actor who created the batch.
    pub created_by: ActorId,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Actor who approved the batch, once approved.
    pub approved_by: Option<ActorId>,

    /// Approval timestamp, once approved.
    pub approved_at: Option<DateTime<Utc>>,
}

/// One row of a batch's eligibility snapshot.
///
/// Snapshot rows are owned by their batch: `generate_students` replaces
/// them wholesale while the batch is draft, and nothing mutates them once
/// the batch leaves draft.
#[derive(Debug, Clone, PartialEq)]
pub struct GraduationStudent {
    /// Unique identifier of the snapshot row.
    pub id: String,

    /// The owning batch.
    pub batch_id: BatchId,

    /// The student this row describes.
    pub student_id: String,

    /// Derived pass/fail verdict.
    pub final_result: FinalResult,

    /// Rank among passing students (1-based), when a percentage was
    /// computable.
    pub position: Option<u32>,

    /// Diagnostics backing the verdict.
    pub report: EligibilityReport,
}
