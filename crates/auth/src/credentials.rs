//! Credential-verification contract.
//!
//! Password hashing, directory lookups and external identity providers all
//! live behind [`CredentialVerifier`]; this crate only fixes the shape.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatehouse_core::{IamError, PrincipalId};

/// Credential fields supplied by a caller (`user`, `password`, ...).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Fetch a mandatory field.
    pub fn require(&self, key: &str) -> Result<&str, AuthFailure> {
        self.get(key)
            .ok_or_else(|| AuthFailure::Malformed(format!("missing credential field '{key}'")))
    }
}

// Values are secrets; only field names are printed.
impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Public description of an authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("malformed credentials: {0}")]
    Malformed(String),

    #[error("provider does not support this operation")]
    Unsupported,

    #[error("provider back-end failure: {0}")]
    Backend(String),
}

impl From<AuthFailure> for IamError {
    fn from(value: AuthFailure) -> Self {
        match value {
            AuthFailure::InvalidCredentials => IamError::InvalidCredentials,
            AuthFailure::Malformed(msg) => IamError::Validation(msg),
            AuthFailure::Unsupported => IamError::unsupported("credential update"),
            AuthFailure::Backend(msg) => IamError::Internal(msg),
        }
    }
}

/// Pluggable per-provider credential check.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    fn descriptor(&self) -> ProviderDescriptor;

    /// Validate credentials and name the principal they belong to.
    async fn verify(&self, credentials: &Credentials) -> Result<PrincipalId, AuthFailure>;

    /// Replace the stored credentials of a principal.
    async fn update_credentials(
        &self,
        _principal: &PrincipalId,
        _credentials: &Credentials,
    ) -> Result<(), AuthFailure> {
        Err(AuthFailure::Unsupported)
    }

    /// Drop whatever the provider keeps for a deleted principal.
    async fn forget(&self, _principal: &PrincipalId) -> Result<(), AuthFailure> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_secret_values() {
        let creds = Credentials::new().with("user", "alice").with("password", "hunter2");
        let printed = format!("{creds:?}");
        assert!(printed.contains("password"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("alice"));
    }

    #[test]
    fn missing_field_is_malformed() {
        let creds: Credentials = serde_json::from_str(r#"{"user":"alice"}"#).unwrap();
        assert_eq!(creds.require("user").unwrap(), "alice");
        let err = creds.require("password").unwrap_err();
        assert!(matches!(IamError::from(err), IamError::Validation(_)));
    }
}
