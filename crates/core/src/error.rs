//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). The HTTP mapping lives in one place in the API
/// layer; storage backends map driver failures to `Unavailable` and log the
/// underlying cause instead of leaking it here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller presented no usable identity.
    #[error("authentication required")]
    Unauthenticated,

    /// The caller is authenticated but not allowed to perform the operation.
    #[error("access denied")]
    Forbidden,

    /// A requested resource is absent, or out of the caller's scope.
    #[error("{0} not found")]
    NotFound(String),

    /// A plan ceiling was reached (hard limit, not a warning).
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The creator already has an open case for this template.
    #[error("an open appeal already exists for this form")]
    DuplicateOpenCase,

    /// A conflict occurred (e.g. unique value taken, concurrent update).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage layer (or a collaborator) failed or timed out. Retryable.
    #[error("service temporarily unavailable")]
    Unavailable,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn quota(msg: impl Into<String>) -> Self {
        Self::QuotaExceeded(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
