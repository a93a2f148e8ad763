use thiserror::Error;

use gatehouse_core::{ErrorKind, IamError};

/// Facade-level failure: the operation that failed plus the untouched cause.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{operation}: {source}")]
pub struct ServiceError {
    pub operation: &'static str,
    #[source]
    pub source: IamError,
}

impl ServiceError {
    pub fn new(operation: &'static str, source: IamError) -> Self {
        Self { operation, source }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Message safe for untrusted callers.
    pub fn public_message(&self) -> String {
        format!("{}: {}", self.operation, self.source.public_message())
    }
}

/// Shorthand for `map_err(|e| ServiceError::new(op, e))`.
pub(crate) fn wrap(operation: &'static str) -> impl FnOnce(IamError) -> ServiceError {
    move |source| ServiceError::new(operation, source)
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn keeps_cause_and_kind() {
        let err = ServiceError::new("createUser", IamError::conflict("principal 'alice' already exists"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "createUser: conflict: principal 'alice' already exists");
        assert!(err.source().is_some());
    }

    #[test]
    fn internal_details_are_redacted() {
        let err = ServiceError::new("listUsers", IamError::internal("connection reset by peer"));
        assert_eq!(err.public_message(), "listUsers: internal error");
        assert!(err.to_string().contains("connection reset"));
    }
}
