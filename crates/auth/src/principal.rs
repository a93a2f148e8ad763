use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gatehouse_core::{PrincipalId, RoleId};

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PrincipalStatus {
    /// Can authenticate; roles count towards effective permissions.
    #[default]
    Active,
    /// Cannot authenticate; bound sessions fall back to anonymous.
    Disabled,
}

impl core::fmt::Display for PrincipalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PrincipalStatus::Active => write!(f, "Active"),
            PrincipalStatus::Disabled => write!(f, "Disabled"),
        }
    }
}

/// An authenticable identity.
///
/// # Invariants
/// - `id` is unique and never changes after creation.
/// - `incarnation` is fresh for every created record, so a principal that is
///   deleted and re-created under the same `id` is a different principal.
/// - `access_revision` increases whenever the effective permissions of this
///   principal may have changed; sessions compare it to detect staleness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub incarnation: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: PrincipalStatus,
    pub roles: BTreeSet<RoleId>,
    pub access_revision: u64,
}

impl Principal {
    pub fn new(id: PrincipalId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            incarnation: Uuid::new_v4(),
            created_at,
            status: PrincipalStatus::Active,
            roles: BTreeSet::new(),
            access_revision: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active
    }

    pub fn has_role(&self, role: &RoleId) -> bool {
        self.roles.contains(role)
    }

    /// Record that cached permission sets for this principal are stale.
    pub fn bump_revision(&mut self) {
        self.access_revision += 1;
    }
}
