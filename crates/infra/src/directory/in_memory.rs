use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use gatehouse_auth::{Principal, Role};
use gatehouse_core::{PrincipalId, RoleId};

use super::r#trait::{DirectoryStore, DirectoryWrite, StoreError};

#[derive(Debug, Default)]
struct Tables {
    principals: BTreeMap<PrincipalId, Principal>,
    roles: BTreeMap<RoleId, Role>,
}

/// In-memory directory.
///
/// Intended for tests/dev. Both tables sit behind one lock so a batch is
/// applied as a unit.
#[derive(Debug)]
pub struct InMemoryDirectory {
    tables: RwLock<Tables>,
    role_management: bool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::with_role_management(true)
    }

    /// Directory advertising the given role-management capability.
    pub fn with_role_management(role_management: bool) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            role_management,
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectory {
    fn supports_role_management(&self) -> bool {
        self.role_management
    }

    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.principals.values().cloned().collect())
    }

    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.principals.get(id).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.roles.values().cloned().collect())
    }

    async fn get_role(&self, id: &RoleId) -> Result<Option<Role>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables.roles.get(id).cloned())
    }

    async fn commit(&self, writes: Vec<DirectoryWrite>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        for write in writes {
            match write {
                DirectoryWrite::PutPrincipal(p) => {
                    tables.principals.insert(p.id.clone(), p);
                }
                DirectoryWrite::RemovePrincipal(id) => {
                    tables.principals.remove(&id);
                }
                DirectoryWrite::PutRole(r) => {
                    tables.roles.insert(r.id.clone(), r);
                }
                DirectoryWrite::RemoveRole(id) => {
                    tables.roles.remove(&id);
                }
            }
        }
        Ok(())
    }
}
