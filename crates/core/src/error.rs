//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every rejection raised while validating a write is one of these variants.
/// A rejection aborts the whole enclosing transaction; nothing here is retried
/// or recovered locally. Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed email address).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness conflict (e.g. duplicate role name under one parent).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The system is misconfigured (e.g. a default role does not exist).
    ///
    /// Not user-recoverable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A non-administrator account was inserted while no administrator exists.
    #[error("first account have to be an administrator account")]
    BootstrapViolation,

    /// A singleton role was combined with other roles.
    #[error("role {role} could not be combined with other roles")]
    RoleConflict { role: String },

    /// A role that is never assignable was assigned to an account.
    #[error("role {role} could not be assigned to account")]
    RoleNotAssignable { role: String },

    /// The email address is already used by another email record.
    #[error("email address {address} is already taken")]
    EmailTaken { address: String },

    /// The default email was flipped to non-default without a replacement.
    #[error("default email address {address} can not be made not default")]
    DefaultEmailDowngrade { address: String },

    /// The default email was deleted while its account stays.
    #[error("default email address {address} can not be deleted")]
    DefaultEmailNotDeletable { address: String },
}

/// Closed classification of [`DomainError`] for transport mapping.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InvariantViolation,
    InvalidId,
    NotFound,
    Conflict,
    Configuration,
    BootstrapViolation,
    RoleConflict,
    RoleNotAssignable,
    EmailUniquenessViolation,
    EmailDefaultDowngradeViolation,
    EmailDefaultNotDeletable,
}

impl ErrorKind {
    /// Whether the error was caused by the request (4xx-equivalent) rather than
    /// by the deployment (5xx-equivalent).
    pub fn is_user_error(self) -> bool {
        !matches!(self, ErrorKind::Configuration)
    }
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            DomainError::InvalidId(_) => ErrorKind::InvalidId,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Configuration(_) => ErrorKind::Configuration,
            DomainError::BootstrapViolation => ErrorKind::BootstrapViolation,
            DomainError::RoleConflict { .. } => ErrorKind::RoleConflict,
            DomainError::RoleNotAssignable { .. } => ErrorKind::RoleNotAssignable,
            DomainError::EmailTaken { .. } => ErrorKind::EmailUniquenessViolation,
            DomainError::DefaultEmailDowngrade { .. } => {
                ErrorKind::EmailDefaultDowngradeViolation
            }
            DomainError::DefaultEmailNotDeletable { .. } => ErrorKind::EmailDefaultNotDeletable,
        }
    }
}
