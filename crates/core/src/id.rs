//! Strongly-typed identifiers used across the identity layer.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IamError;

const MAX_ID_LEN: usize = 128;

/// Identifier of a principal (user). Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

/// Identifier of a role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(String);

/// Identifier of a permission in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionId(String);

fn validate(name: &'static str, raw: &str) -> Result<String, IamError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(IamError::validation(format!("{name} cannot be empty")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(IamError::validation(format!(
            "{name} exceeds {MAX_ID_LEN} characters"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@')))
    {
        return Err(IamError::validation(format!(
            "{name} contains invalid character '{bad}'"
        )));
    }
    Ok(value.to_string())
}

macro_rules! impl_string_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Parse and validate an identifier.
            pub fn parse(raw: &str) -> Result<Self, IamError> {
                validate($name, raw).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = IamError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $t {
            type Error = IamError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_id!(PrincipalId, "principal id");
impl_string_id!(RoleId, "role id");
impl_string_id!(PermissionId, "permission id");

/// Opaque session token handed to callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Generate a fresh random token (UUIDv4, not guessable from time).
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionToken {
    type Err = IamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s.trim())
            .map_err(|e| IamError::validation(format!("session token: {e}")))?;
        Ok(Self(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_trimmed() {
        let id = PrincipalId::parse("  alice ").unwrap();
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn empty_identifier_rejected() {
        let err = PrincipalId::parse("   ").unwrap_err();
        assert!(matches!(err, IamError::Validation(_)));
    }

    #[test]
    fn malformed_identifier_rejected() {
        assert!(RoleId::parse("db a").is_err());
        assert!(RoleId::parse("dba;drop").is_err());
        assert!(PermissionId::parse(&"x".repeat(MAX_ID_LEN + 1)).is_err());
        assert!(PrincipalId::parse("alice.smith@example.com").is_ok());
    }

    #[test]
    fn deserialization_validates() {
        let ok: RoleId = serde_json::from_str("\"dba\"").unwrap();
        assert_eq!(ok.as_str(), "dba");
        assert!(serde_json::from_str::<RoleId>("\"\"").is_err());
    }

    #[test]
    fn session_token_round_trips_through_display() {
        let token = SessionToken::generate();
        let parsed: SessionToken = token.to_string().parse().unwrap();
        assert_eq!(parsed, token);
        assert!("not-a-token".parse::<SessionToken>().is_err());
    }
}
