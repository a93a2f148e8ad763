use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use gatehouse_core::{PermissionId, RoleId};

/// Named, reusable bundle of permissions.
///
/// Every permission id must exist in the [`crate::PermissionCatalog`]; the
/// security controller checks this before a role is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub label: String,
    pub permissions: BTreeSet<PermissionId>,
}

impl Role {
    /// New role with no permissions, labelled with its identifier.
    pub fn new(id: RoleId) -> Self {
        Self {
            label: id.as_str().to_string(),
            id,
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = PermissionId>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    pub fn grants(&self, permission: &PermissionId) -> bool {
        self.permissions.contains(permission)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.id.as_str())
    }
}
