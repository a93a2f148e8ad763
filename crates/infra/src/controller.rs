//! Security controller: orchestrates the directory store, the permission
//! catalog and the credential verifiers.
//!
//! ## Concurrency
//!
//! Every operation runs under a controller-wide gate: readers share it,
//! mutations hold it exclusively for their whole read-modify-write and
//! persist their changes as a single [`DirectoryWrite`] batch. Readers
//! therefore never observe a half-applied mutation.
//!
//! ## Staleness
//!
//! Any mutation that may change a principal's effective permissions bumps
//! `Principal::access_revision`. Sessions compare revisions on every access
//! and recompute before answering; see [`crate::session`].
//!
//! ## Timeouts
//!
//! Store and credential calls are bounded by
//! [`ControllerSettings::operation_timeout`]. Dropping the in-flight future
//! cancels it; the caller gets [`IamError::Timeout`].

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use gatehouse_auth::{
    Credentials, CredentialVerifier, Permission, PermissionCatalog, PermissionSet, Principal,
    PrincipalStatus, ProviderDescriptor, Role, resolve_effective_permissions,
};
use gatehouse_core::{IamError, IamResult, PermissionId, PrincipalId, RoleId};

use crate::directory::{DirectoryStore, DirectoryWrite};

/// A principal together with its freshly computed permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccess {
    pub principal: Principal,
    pub permissions: PermissionSet,
}

/// Identity-and-access operations consumed by sessions and facades.
#[async_trait]
pub trait SecurityController: Send + Sync {
    /// Principals whose identifier contains `filter` (case-insensitive).
    /// `None` or an empty filter returns everything.
    async fn find_principals(&self, filter: Option<&str>) -> IamResult<Vec<Principal>>;

    async fn find_principal(&self, id: &PrincipalId) -> IamResult<Option<Principal>>;

    async fn create_principal(&self, identifier: &str) -> IamResult<Principal>;

    /// Irreversible. Sessions bound to the principal lose their binding.
    async fn delete_principal(&self, identifier: &str) -> IamResult<()>;

    async fn set_principal_enabled(&self, identifier: &str, enabled: bool) -> IamResult<Principal>;

    /// Same filter semantics as [`SecurityController::find_principals`].
    async fn find_roles(&self, filter: Option<&str>) -> IamResult<Vec<Role>>;

    fn list_all_permissions(&self) -> Vec<Permission>;

    /// Capability flag; role-management calls fail with `Unsupported` when false.
    fn supports_role_management(&self) -> bool;

    async fn create_role(&self, identifier: &str) -> IamResult<Role>;

    async fn delete_role(&self, identifier: &str) -> IamResult<()>;

    async fn grant_role(&self, principal: &str, role: &str) -> IamResult<()>;

    async fn revoke_role(&self, principal: &str, role: &str) -> IamResult<()>;

    async fn set_role_permissions(&self, role: &str, permissions: &[String]) -> IamResult<()>;

    async fn verify_credentials(&self, provider: &str, credentials: &Credentials) -> IamResult<Principal>;

    async fn update_credentials(
        &self,
        provider: &str,
        principal: &str,
        credentials: &Credentials,
    ) -> IamResult<()>;

    /// Enabled credential providers, ordered by id.
    fn list_providers(&self) -> Vec<ProviderDescriptor>;

    /// Current record and effective permissions; `None` if the principal is gone.
    async fn resolve_access(&self, id: &PrincipalId) -> IamResult<Option<ResolvedAccess>>;
}

/// Tunables for [`DirectorySecurityController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub operation_timeout: Duration,
    /// Deployment switch; combined with the store's own capability.
    pub role_management: bool,
    /// `None` enables every registered provider.
    pub enabled_providers: Option<BTreeSet<String>>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            role_management: true,
            enabled_providers: None,
        }
    }
}

/// [`SecurityController`] backed by a [`DirectoryStore`].
pub struct DirectorySecurityController<S> {
    store: S,
    catalog: PermissionCatalog,
    verifiers: BTreeMap<String, Arc<dyn CredentialVerifier>>,
    settings: ControllerSettings,
    gate: RwLock<()>,
}

impl<S: DirectoryStore> DirectorySecurityController<S> {
    pub fn new(store: S, catalog: PermissionCatalog, settings: ControllerSettings) -> Self {
        Self {
            store,
            catalog,
            verifiers: BTreeMap::new(),
            settings,
            gate: RwLock::new(()),
        }
    }

    /// Register a credential provider under its descriptor id.
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifiers.insert(verifier.descriptor().id, verifier);
        self
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    async fn bounded<T, E, F>(&self, operation: &str, fut: F) -> IamResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<IamError>,
    {
        match tokio::time::timeout(self.settings.operation_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.settings.operation_timeout, "operation timed out");
                Err(IamError::timeout(operation, self.settings.operation_timeout))
            }
        }
    }

    fn ensure_role_management(&self, operation: &str) -> IamResult<()> {
        if self.supports_role_management() {
            Ok(())
        } else {
            Err(IamError::unsupported(operation))
        }
    }

    fn provider_enabled(&self, provider: &str) -> bool {
        self.settings
            .enabled_providers
            .as_ref()
            .is_none_or(|enabled| enabled.contains(provider))
    }

    fn verifier(&self, provider: &str) -> IamResult<&Arc<dyn CredentialVerifier>> {
        match self.verifiers.get(provider) {
            Some(v) if self.provider_enabled(provider) => Ok(v),
            _ => Err(IamError::UnknownProvider(provider.to_string())),
        }
    }

    async fn load_principal(&self, operation: &str, id: &PrincipalId) -> IamResult<Principal> {
        self.bounded(operation, self.store.get_principal(id))
            .await?
            .ok_or_else(|| IamError::not_found("principal", id.as_str()))
    }

    async fn load_role(&self, operation: &str, id: &RoleId) -> IamResult<Role> {
        self.bounded(operation, self.store.get_role(id))
            .await?
            .ok_or_else(|| IamError::not_found("role", id.as_str()))
    }

    /// Every principal holding `role`, with the role edit applied and revision bumped.
    async fn holders_of(
        &self,
        operation: &str,
        role: &RoleId,
        edit: impl Fn(&mut Principal),
    ) -> IamResult<Vec<DirectoryWrite>> {
        let principals = self.bounded(operation, self.store.list_principals()).await?;
        Ok(principals
            .into_iter()
            .filter(|p| p.has_role(role))
            .map(|mut p| {
                edit(&mut p);
                p.bump_revision();
                DirectoryWrite::PutPrincipal(p)
            })
            .collect())
    }

    async fn commit(&self, operation: &str, writes: Vec<DirectoryWrite>) -> IamResult<()> {
        self.bounded(operation, self.store.commit(writes)).await
    }
}

fn matches_filter(id: &str, filter: Option<&str>) -> bool {
    match filter.map(str::trim) {
        None | Some("") => true,
        Some(f) => id.to_lowercase().contains(&f.to_lowercase()),
    }
}

#[async_trait]
impl<S: DirectoryStore> SecurityController for DirectorySecurityController<S> {
    async fn find_principals(&self, filter: Option<&str>) -> IamResult<Vec<Principal>> {
        let _read = self.gate.read().await;
        let principals = self.bounded("findPrincipals", self.store.list_principals()).await?;
        Ok(principals
            .into_iter()
            .filter(|p| matches_filter(p.id.as_str(), filter))
            .collect())
    }

    async fn find_principal(&self, id: &PrincipalId) -> IamResult<Option<Principal>> {
        let _read = self.gate.read().await;
        self.bounded("findPrincipal", self.store.get_principal(id)).await
    }

    async fn create_principal(&self, identifier: &str) -> IamResult<Principal> {
        let id = PrincipalId::parse(identifier)?;
        let _write = self.gate.write().await;

        if self.bounded("createPrincipal", self.store.get_principal(&id)).await?.is_some() {
            return Err(IamError::conflict(format!("principal '{id}' already exists")));
        }

        let principal = Principal::new(id, Utc::now());
        self.commit("createPrincipal", vec![DirectoryWrite::PutPrincipal(principal.clone())])
            .await?;

        tracing::info!(principal = %principal.id, "principal created");
        Ok(principal)
    }

    async fn delete_principal(&self, identifier: &str) -> IamResult<()> {
        let id = PrincipalId::parse(identifier)?;
        {
            let _write = self.gate.write().await;
            self.load_principal("deletePrincipal", &id).await?;
            self.commit("deletePrincipal", vec![DirectoryWrite::RemovePrincipal(id.clone())])
                .await?;
        }
        tracing::info!(principal = %id, "principal deleted");

        for (provider, verifier) in &self.verifiers {
            if let Err(e) = self.bounded("forgetCredentials", verifier.forget(&id)).await {
                tracing::warn!(principal = %id, provider = %provider, error = %e, "failed to drop stored credentials");
            }
        }
        Ok(())
    }

    async fn set_principal_enabled(&self, identifier: &str, enabled: bool) -> IamResult<Principal> {
        let id = PrincipalId::parse(identifier)?;
        let _write = self.gate.write().await;

        let mut principal = self.load_principal("setPrincipalEnabled", &id).await?;
        let status = if enabled {
            PrincipalStatus::Active
        } else {
            PrincipalStatus::Disabled
        };
        if principal.status == status {
            return Ok(principal);
        }

        principal.status = status;
        principal.bump_revision();
        self.commit("setPrincipalEnabled", vec![DirectoryWrite::PutPrincipal(principal.clone())])
            .await?;

        tracing::info!(principal = %id, %status, "principal status changed");
        Ok(principal)
    }

    async fn find_roles(&self, filter: Option<&str>) -> IamResult<Vec<Role>> {
        let _read = self.gate.read().await;
        let roles = self.bounded("findRoles", self.store.list_roles()).await?;
        Ok(roles
            .into_iter()
            .filter(|r| matches_filter(r.id.as_str(), filter))
            .collect())
    }

    fn list_all_permissions(&self) -> Vec<Permission> {
        self.catalog.list()
    }

    fn supports_role_management(&self) -> bool {
        self.settings.role_management && self.store.supports_role_management()
    }

    async fn create_role(&self, identifier: &str) -> IamResult<Role> {
        self.ensure_role_management("createRole")?;
        let id = RoleId::parse(identifier)?;
        let _write = self.gate.write().await;

        if self.bounded("createRole", self.store.get_role(&id)).await?.is_some() {
            return Err(IamError::conflict(format!("role '{id}' already exists")));
        }

        let role = Role::new(id);
        self.commit("createRole", vec![DirectoryWrite::PutRole(role.clone())])
            .await?;

        tracing::info!(role = %role.id, "role created");
        Ok(role)
    }

    async fn delete_role(&self, identifier: &str) -> IamResult<()> {
        self.ensure_role_management("deleteRole")?;
        let id = RoleId::parse(identifier)?;
        let _write = self.gate.write().await;

        self.load_role("deleteRole", &id).await?;
        let mut writes = vec![DirectoryWrite::RemoveRole(id.clone())];
        writes.extend(
            self.holders_of("deleteRole", &id, |p| {
                p.roles.remove(&id);
            })
            .await?,
        );
        let affected = writes.len() - 1;
        self.commit("deleteRole", writes).await?;

        tracing::info!(role = %id, affected, "role deleted");
        Ok(())
    }

    async fn grant_role(&self, principal: &str, role: &str) -> IamResult<()> {
        self.ensure_role_management("grantRole")?;
        let principal_id = PrincipalId::parse(principal)?;
        let role_id = RoleId::parse(role)?;
        let _write = self.gate.write().await;

        let mut record = self.load_principal("grantRole", &principal_id).await?;
        self.load_role("grantRole", &role_id).await?;
        if !record.roles.insert(role_id.clone()) {
            return Ok(());
        }

        record.bump_revision();
        self.commit("grantRole", vec![DirectoryWrite::PutPrincipal(record)])
            .await?;

        tracing::info!(principal = %principal_id, role = %role_id, "role granted");
        Ok(())
    }

    async fn revoke_role(&self, principal: &str, role: &str) -> IamResult<()> {
        self.ensure_role_management("revokeRole")?;
        let principal_id = PrincipalId::parse(principal)?;
        let role_id = RoleId::parse(role)?;
        let _write = self.gate.write().await;

        let mut record = self.load_principal("revokeRole", &principal_id).await?;
        self.load_role("revokeRole", &role_id).await?;
        if !record.roles.remove(&role_id) {
            return Ok(());
        }

        record.bump_revision();
        self.commit("revokeRole", vec![DirectoryWrite::PutPrincipal(record)])
            .await?;

        tracing::info!(principal = %principal_id, role = %role_id, "role revoked");
        Ok(())
    }

    async fn set_role_permissions(&self, role: &str, permissions: &[String]) -> IamResult<()> {
        self.ensure_role_management("setRolePermissions")?;
        let role_id = RoleId::parse(role)?;
        let permission_ids = permissions
            .iter()
            .map(|p| PermissionId::parse(p))
            .collect::<IamResult<PermissionSet>>()?;
        self.catalog.ensure_known(&permission_ids)?;

        let _write = self.gate.write().await;
        let mut record = self.load_role("setRolePermissions", &role_id).await?;
        record.permissions = permission_ids;

        let mut writes = vec![DirectoryWrite::PutRole(record)];
        writes.extend(self.holders_of("setRolePermissions", &role_id, |_| {}).await?);
        let affected = writes.len() - 1;
        self.commit("setRolePermissions", writes).await?;

        tracing::info!(role = %role_id, affected, "role permissions replaced");
        Ok(())
    }

    async fn verify_credentials(&self, provider: &str, credentials: &Credentials) -> IamResult<Principal> {
        let verifier = self.verifier(provider)?;

        let principal_id = match self.bounded("verifyCredentials", verifier.verify(credentials)).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(provider, kind = %e.kind(), "credential verification failed");
                return Err(e);
            }
        };

        let _read = self.gate.read().await;
        match self
            .bounded("verifyCredentials", self.store.get_principal(&principal_id))
            .await?
        {
            Some(p) if p.is_active() => Ok(p),
            Some(_) => {
                tracing::warn!(provider, principal = %principal_id, "login refused for disabled principal");
                Err(IamError::InvalidCredentials)
            }
            None => {
                tracing::warn!(provider, principal = %principal_id, "credentials map to unknown principal");
                Err(IamError::InvalidCredentials)
            }
        }
    }

    async fn update_credentials(
        &self,
        provider: &str,
        principal: &str,
        credentials: &Credentials,
    ) -> IamResult<()> {
        let verifier = self.verifier(provider)?;
        let id = PrincipalId::parse(principal)?;

        let _read = self.gate.read().await;
        self.load_principal("updateCredentials", &id).await?;
        self.bounded("updateCredentials", verifier.update_credentials(&id, credentials))
            .await?;

        tracing::info!(provider, principal = %id, "credentials updated");
        Ok(())
    }

    fn list_providers(&self) -> Vec<ProviderDescriptor> {
        self.verifiers
            .iter()
            .filter(|(id, _)| self.provider_enabled(id))
            .map(|(_, v)| v.descriptor())
            .collect()
    }

    async fn resolve_access(&self, id: &PrincipalId) -> IamResult<Option<ResolvedAccess>> {
        let _read = self.gate.read().await;
        let Some(principal) = self.bounded("resolveAccess", self.store.get_principal(id)).await? else {
            return Ok(None);
        };
        let roles = self.bounded("resolveAccess", self.store.list_roles()).await?;
        let permissions = resolve_effective_permissions(&principal, &roles);
        Ok(Some(ResolvedAccess {
            principal,
            permissions,
        }))
    }
}
