//! Batch module error types.

use thiserror::Error;

use crate::eligibility::EligibilityError;
use crate::error::ErrorClass;
use crate::store::StoreError;

use super::state::BatchStatus;

/// Errors that can occur during batch lifecycle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BatchError {
    /// The batch does not exist or lies outside the tenant scope.
    #[error("graduation batch not found: {batch_id}")]
    BatchNotFound {
        /// The batch that was not found.
        batch_id: String,
    },

    /// Snapshot regeneration was requested past the draft state.
    #[error("cannot regenerate once approved or issued: batch {batch_id} is {status}")]
    CannotRegenerate {
        /// The batch.
        batch_id: String,
        /// Its current status.
        status: BatchStatus,
    },

    /// The requested transition is not in the state machine's table.
    #[error("transition from {from} to {to} is not allowed for batch {batch_id}")]
    TransitionNotAllowed {
        /// The batch.
        batch_id: String,
        /// Its current status.
        from: BatchStatus,
        /// The attempted target status.
        to: BatchStatus,
    },

    /// A batch needs at least one exam to derive eligibility from.
    #[error("a graduation batch requires at least one exam")]
    EmptyExamList,

    /// Eligibility evaluation failed.
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BatchError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::BatchNotFound { .. } => ErrorClass::NotFound,
            Self::CannotRegenerate { .. } | Self::TransitionNotAllowed { .. } => {
                ErrorClass::InvalidState
            }
            Self::EmptyExamList => ErrorClass::Unprocessable,
            Self::Eligibility(err) => err.class(),
            Self::Store(err) => err.class(),
        }
    }
}
