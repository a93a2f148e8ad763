use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use gatehouse_auth::{Principal, Role};
use gatehouse_core::{IamError, PrincipalId, RoleId};

/// One write in an atomic directory batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryWrite {
    /// Insert or replace a principal record.
    PutPrincipal(Principal),
    RemovePrincipal(PrincipalId),
    /// Insert or replace a role record.
    PutRole(Role),
    RemoveRole(RoleId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("directory backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for IamError {
    fn from(value: StoreError) -> Self {
        IamError::internal(value.to_string())
    }
}

/// Storage contract for principal and role records.
///
/// ## Atomicity
///
/// [`DirectoryStore::commit`] applies a whole batch or nothing. Readers of a
/// conforming backend never observe a half-applied batch. Uniqueness and
/// reference checks are the caller's job; the store stores.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Whether this backend can persist role changes at all.
    fn supports_role_management(&self) -> bool;

    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError>;

    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError>;

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    async fn get_role(&self, id: &RoleId) -> Result<Option<Role>, StoreError>;

    async fn commit(&self, writes: Vec<DirectoryWrite>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> DirectoryStore for Arc<S>
where
    S: DirectoryStore + ?Sized,
{
    fn supports_role_management(&self) -> bool {
        (**self).supports_role_management()
    }

    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError> {
        (**self).list_principals().await
    }

    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        (**self).get_principal(id).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        (**self).list_roles().await
    }

    async fn get_role(&self, id: &RoleId) -> Result<Option<Role>, StoreError> {
        (**self).get_role(id).await
    }

    async fn commit(&self, writes: Vec<DirectoryWrite>) -> Result<(), StoreError> {
        (**self).commit(writes).await
    }
}
