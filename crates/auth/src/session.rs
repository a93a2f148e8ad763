//! Access-session state machine.
//!
//! ```text
//! Anonymous ──begin──▶ Authenticating ──bind──▶ Authenticated ──expire──▶ Expired
//!     ▲                     │                        │                      │
//!     └──────── reset ──────┴──────── reset ─────────┴──────── reset ───────┘
//! ```
//!
//! This module only tracks state. Credential checks and permission lookups
//! are done by whoever drives the transitions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use gatehouse_core::{IamError, PrincipalId};

use crate::PermissionSet;

/// Data-less view of [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    Expired,
}

/// What an authenticated session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    /// Non-owning reference; the principal record lives in the store.
    pub principal_id: PrincipalId,
    /// `Principal::incarnation` at login; a mismatch means the record was replaced.
    pub incarnation: Uuid,
    pub provider: String,
    pub permissions: PermissionSet,
    /// `Principal::access_revision` the permissions were computed at.
    pub access_revision: u64,
    pub authenticated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated(SessionBinding),
    Expired,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Anonymous => SessionPhase::Anonymous,
            SessionState::Authenticating => SessionPhase::Authenticating,
            SessionState::Authenticated(_) => SessionPhase::Authenticated,
            SessionState::Expired => SessionPhase::Expired,
        }
    }

    pub fn binding(&self) -> Option<&SessionBinding> {
        match self {
            SessionState::Authenticated(b) => Some(b),
            _ => None,
        }
    }

    pub fn binding_mut(&mut self) -> Option<&mut SessionBinding> {
        match self {
            SessionState::Authenticated(b) => Some(b),
            _ => None,
        }
    }

    /// Start a login attempt. Any prior binding is dropped.
    pub fn begin_authentication(&mut self) {
        *self = SessionState::Authenticating;
    }

    /// Complete a login attempt.
    pub fn bind(&mut self, binding: SessionBinding) -> Result<(), IamError> {
        if !matches!(self, SessionState::Authenticating) {
            return Err(IamError::validation(format!(
                "cannot bind a session in phase {:?}",
                self.phase()
            )));
        }
        *self = SessionState::Authenticated(binding);
        Ok(())
    }

    /// Back to anonymous (failed login, logout, invalidated principal).
    pub fn reset(&mut self) {
        *self = SessionState::Anonymous;
    }

    /// Move to `Expired` once the binding's window has closed.
    ///
    /// Returns `true` if the transition happened.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        let due = self.binding().is_some_and(|b| now >= b.expires_at);
        if due {
            *self = SessionState::Expired;
        }
        due
    }

    /// Effective permissions; empty unless authenticated.
    pub fn permissions(&self) -> PermissionSet {
        self.binding()
            .map(|b| b.permissions.clone())
            .unwrap_or_default()
    }
}
