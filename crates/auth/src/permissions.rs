use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gatehouse_core::{IamError, IamResult, PermissionId};

/// Permission granting access to the administrative operations.
pub const ADMIN: &str = "admin";

/// Permission every signed-in user is expected to hold.
pub const PUBLIC: &str = "public";

/// Effective permission set (ordered for stable output).
pub type PermissionSet = BTreeSet<PermissionId>;

/// Catalog entry. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub category: String,
    pub description: String,
}

impl Permission {
    pub fn new(id: PermissionId, category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            category: category.into(),
            description: description.into(),
        }
    }

    /// Build an entry whose category and description are derived from a
    /// dotted identifier such as `"datasource.connect"`.
    pub fn derived(id: PermissionId) -> Self {
        let category = derive_category(id.as_str());
        let description = derive_description(id.as_str());
        Self {
            id,
            category,
            description,
        }
    }
}

fn derive_category(perm: &str) -> String {
    match perm.split_once('.') {
        Some((module, _)) => module.to_string(),
        None => "general".to_string(),
    }
}

fn derive_description(perm: &str) -> String {
    let parts: Vec<&str> = perm.split('.').collect();
    if parts.len() < 2 {
        return format!("Grants '{perm}'");
    }

    let action = parts[parts.len() - 1];
    let resource = parts[..parts.len() - 1].join(".");
    let action_desc = match action {
        "read" => "View/list",
        "write" => "Create/update/delete",
        "connect" => "Connect to",
        "manage" => "Manage",
        _ => action,
    };
    format!("{action_desc} {resource}")
}

/// Closed catalog of known permissions, fixed at process start.
#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    entries: BTreeMap<PermissionId, Permission>,
}

impl PermissionCatalog {
    /// Build a catalog; duplicate identifiers are rejected.
    pub fn new(entries: impl IntoIterator<Item = Permission>) -> IamResult<Self> {
        let mut catalog = Self::default();
        for entry in entries {
            catalog.register(entry)?;
        }
        Ok(catalog)
    }

    /// The built-in `admin` and `public` permissions.
    pub fn standard() -> Self {
        let entries = [
            (ADMIN, "Administer users, roles and permissions"),
            (PUBLIC, "Basic signed-in access"),
        ]
        .into_iter()
        .filter_map(|(id, description)| {
            let id = PermissionId::parse(id).ok()?;
            Some((id.clone(), Permission::new(id, "system", description)))
        })
        .collect();
        Self { entries }
    }

    /// Standard catalog extended with deployment-specific entries.
    pub fn standard_with(extra: impl IntoIterator<Item = Permission>) -> IamResult<Self> {
        let mut catalog = Self::standard();
        for entry in extra {
            catalog.register(entry)?;
        }
        Ok(catalog)
    }

    fn register(&mut self, entry: Permission) -> IamResult<()> {
        if self.entries.contains_key(&entry.id) {
            return Err(IamError::conflict(format!(
                "permission '{}' registered twice",
                entry.id
            )));
        }
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    pub fn contains(&self, id: &PermissionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &PermissionId) -> Option<&Permission> {
        self.entries.get(id)
    }

    pub fn list(&self) -> Vec<Permission> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails on the first identifier missing from the catalog.
    pub fn ensure_known<'a>(&self, ids: impl IntoIterator<Item = &'a PermissionId>) -> IamResult<()> {
        for id in ids {
            if !self.contains(id) {
                return Err(IamError::not_found("permission", id.as_str()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PermissionId {
        PermissionId::parse(s).unwrap()
    }

    #[test]
    fn standard_catalog_has_admin_and_public() {
        let catalog = PermissionCatalog::standard();
        assert!(catalog.contains(&pid(ADMIN)));
        assert!(catalog.contains(&pid(PUBLIC)));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn duplicate_registration_is_a_conflict() {
        let err = PermissionCatalog::standard_with([Permission::derived(pid(ADMIN))]).unwrap_err();
        assert!(matches!(err, IamError::Conflict(_)));
    }

    #[test]
    fn unknown_permission_reported_by_id() {
        let catalog = PermissionCatalog::standard();
        let err = catalog.ensure_known([&pid(ADMIN), &pid("DB_CONNECT")]).unwrap_err();
        assert_eq!(err, IamError::not_found("permission", "DB_CONNECT"));
    }

    #[test]
    fn derived_entries_use_dotted_prefix() {
        let p = Permission::derived(pid("datasource.connect"));
        assert_eq!(p.category, "datasource");
        assert_eq!(p.description, "Connect to datasource");

        let flat = Permission::derived(pid("DB_CONNECT"));
        assert_eq!(flat.category, "general");
    }
}
