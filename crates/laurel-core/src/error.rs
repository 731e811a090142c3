//! Shared failure taxonomy.
//!
//! Every error enum in this crate exposes a `class()` accessor mapping its
//! variants onto this taxonomy, so transport layers can translate failures
//! (HTTP status, RPC code) without matching every variant of every module.

use std::fmt;

/// Coarse classification of a failure.
///
/// Business failures (`NotFound`, `InvalidState`, `Unprocessable`,
/// `Conflict`) are returned to the caller as-is and are never retried
/// inside this crate. `Infrastructure` failures (lock wait timeout,
/// transient database error, provider outage) are expected to be retried
/// by the caller a bounded number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorClass {
    /// The target entity does not exist or is outside the tenant scope.
    NotFound,

    /// The entity is in the wrong lifecycle state for the requested
    /// transition.
    InvalidState,

    /// A business precondition failed (exam not finalized, inactive
    /// template, no eligible students).
    Unprocessable,

    /// A uniqueness guarantee was violated. Prevented by the locking
    /// protocol; retained as defense-in-depth behind the unique indexes.
    Conflict,

    /// A storage or provider failure unrelated to business state.
    Infrastructure,
}

impl ErrorClass {
    /// Returns the class as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::Unprocessable => "unprocessable",
            Self::Conflict => "conflict",
            Self::Infrastructure => "infrastructure",
        }
    }

    /// Returns `true` if the caller may retry the failed call unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
