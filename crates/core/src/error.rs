//! Identity and access error model.

use std::time::Duration;

use thiserror::Error;

/// Result type used across the identity layer.
pub type IamResult<T> = Result<T, IamError>;

/// Identity/access failure.
///
/// Each variant is a distinct, branchable outcome. Callers match on
/// [`IamError::kind`] instead of inspecting messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IamError {
    /// Malformed input (bad identifier, missing argument).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Identifier already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unknown principal/role/permission/provider reference.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The caller's session lacks the required permission.
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unknown authentication provider '{0}'")]
    UnknownProvider(String),

    /// Operation intentionally not offered by this deployment.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Store or back-end fault. Never shown verbatim to untrusted callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IamError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn forbidden(permission: impl Into<String>) -> Self {
        Self::Forbidden(permission.into())
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IamError::Validation(_) => ErrorKind::Validation,
            IamError::Conflict(_) => ErrorKind::Conflict,
            IamError::NotFound { .. } => ErrorKind::NotFound,
            IamError::Forbidden(_) => ErrorKind::Forbidden,
            IamError::InvalidCredentials => ErrorKind::InvalidCredentials,
            IamError::UnknownProvider(_) => ErrorKind::UnknownProvider,
            IamError::Unsupported(_) => ErrorKind::Unsupported,
            IamError::Timeout { .. } => ErrorKind::Timeout,
            IamError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand to an untrusted caller.
    pub fn public_message(&self) -> String {
        match self {
            IamError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Flat tag of an [`IamError`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Forbidden,
    InvalidCredentials,
    UnknownProvider,
    Unsupported,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Stable error code used by transport bindings.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::UnknownProvider => "unknown_provider",
            ErrorKind::Unsupported => "unsupported_operation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_message_is_redacted() {
        let err = IamError::internal("connection refused: db-primary:5432");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "internal error");
        assert!(err.to_string().contains("db-primary"));
    }

    #[test]
    fn distinct_failures_keep_distinct_codes() {
        let not_found = IamError::not_found("principal", "alice");
        let conflict = IamError::conflict("principal 'alice' already exists");

        assert_eq!(not_found.kind().code(), "not_found");
        assert_eq!(conflict.kind().code(), "conflict");
        assert_eq!(not_found.to_string(), "principal 'alice' not found");
    }

    #[test]
    fn unsupported_is_not_forbidden() {
        let err = IamError::unsupported("createRole");
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_ne!(err.kind(), ErrorKind::Forbidden);
    }
}
