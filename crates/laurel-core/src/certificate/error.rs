//! Certificate module error types.

use thiserror::Error;

use crate::batch::BatchStatus;
use crate::error::ErrorClass;
use crate::providers::ProviderError;
use crate::store::StoreError;

/// Errors that can occur during certificate issuance.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IssueError {
    /// The batch does not exist or lies outside the tenant scope.
    #[error("graduation batch not found: {batch_id}")]
    BatchNotFound {
        /// The batch that was not found.
        batch_id: String,
    },

    /// Certificates can only be issued for an approved batch.
    #[error("batch {batch_id} is {status}, certificates can only be issued once approved")]
    BatchNotApproved {
        /// The batch.
        batch_id: String,
        /// Its current status.
        status: BatchStatus,
    },

    /// Render retry targets a batch that has not been issued.
    #[error("batch {batch_id} is {status}, renders can only be retried once issued")]
    BatchNotIssued {
        /// The batch.
        batch_id: String,
        /// Its current status.
        status: BatchStatus,
    },

    /// The template does not exist within the organization.
    #[error("certificate template not found: {template_id}")]
    TemplateNotFound {
        /// The missing template.
        template_id: String,
    },

    /// The template exists but is not active.
    #[error("certificate template is inactive: {template_id}")]
    TemplateInactive {
        /// The inactive template.
        template_id: String,
    },

    /// The template is scoped to a different school.
    #[error("certificate template {template_id} is not available to school {school_id}")]
    TemplateSchoolMismatch {
        /// The template.
        template_id: String,
        /// The requesting school.
        school_id: String,
    },

    /// The batch snapshot contains no passing students.
    #[error("no eligible students in batch {batch_id}")]
    NoEligibleStudents {
        /// The batch.
        batch_id: String,
    },

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl IssueError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::BatchNotFound { .. } => ErrorClass::NotFound,
            Self::BatchNotApproved { .. } | Self::BatchNotIssued { .. } => ErrorClass::InvalidState,
            Self::TemplateNotFound { .. }
            | Self::TemplateInactive { .. }
            | Self::TemplateSchoolMismatch { .. }
            | Self::NoEligibleStudents { .. } => ErrorClass::Unprocessable,
            Self::Store(err) => err.class(),
            Self::Provider(_) => ErrorClass::Infrastructure,
        }
    }
}
