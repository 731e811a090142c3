//! Eligibility module error types.

use thiserror::Error;

use crate::error::ErrorClass;
use crate::providers::ProviderError;

/// Errors that can occur during eligibility evaluation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EligibilityError {
    /// The exam does not exist within the organization.
    #[error("exam not found in organization: {exam_id}")]
    ExamNotFound {
        /// The missing exam.
        exam_id: String,
    },

    /// The exam exists but its results are not finalized.
    #[error("exam results must be finalized: {exam_id}")]
    ResultsNotFinalized {
        /// The offending exam.
        exam_id: String,
    },

    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl EligibilityError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ExamNotFound { .. } | Self::ResultsNotFinalized { .. } => {
                ErrorClass::Unprocessable
            }
            Self::Provider(_) => ErrorClass::Infrastructure,
        }
    }
}
