//! Render module error types.

use thiserror::Error;

use crate::error::ErrorClass;
use crate::providers::ProviderError;

/// Errors that can occur during render orchestration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// The template carries neither a coordinate layout nor an HTML body.
    #[error("template {template_id} has no usable layout")]
    MissingLayout {
        /// The offending template.
        template_id: String,
    },

    /// A provider call failed (blob read, QR encoding, the backend
    /// itself).
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl RenderError {
    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::MissingLayout { .. } => ErrorClass::Unprocessable,
            Self::Provider(_) => ErrorClass::Infrastructure,
        }
    }
}
