//! Administrative facade.
//!
//! Every operation checks the caller's session for the `admin` permission
//! before touching the controller; a denied call performs no work. Controller
//! failures come back as [`ServiceError`] with the original cause attached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gatehouse_auth::{ADMIN, Credentials, Permission, Principal, Role};
use gatehouse_core::{PermissionId, PrincipalId};
use gatehouse_infra::{AccessSession, SecurityController, SessionManager};

use crate::error::{ServiceError, wrap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserInfo {
    pub name: String,
    pub enabled: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for AdminUserInfo {
    fn from(p: &Principal) -> Self {
        Self {
            name: p.id.to_string(),
            enabled: p.is_active(),
            roles: p.roles.iter().map(|r| r.to_string()).collect(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRoleInfo {
    pub name: String,
    pub label: String,
    pub permissions: Vec<String>,
}

impl From<&Role> for AdminRoleInfo {
    fn from(r: &Role) -> Self {
        Self {
            name: r.id.to_string(),
            label: r.label.clone(),
            permissions: r.permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPermissionInfo {
    pub name: String,
    pub category: String,
    pub description: String,
}

impl From<&Permission> for AdminPermissionInfo {
    fn from(p: &Permission) -> Self {
        Self {
            name: p.id.to_string(),
            category: p.category.clone(),
            description: p.description.clone(),
        }
    }
}

pub struct AdminService {
    controller: Arc<dyn SecurityController>,
    sessions: Option<Arc<SessionManager>>,
}

impl AdminService {
    pub fn new(controller: Arc<dyn SecurityController>) -> Self {
        Self {
            controller,
            sessions: None,
        }
    }

    /// Unbind a deleted user's registered sessions right away instead of on
    /// their next access.
    pub fn with_sessions(mut self, sessions: Arc<SessionManager>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    async fn guard(&self, session: &AccessSession, operation: &'static str) -> Result<(), ServiceError> {
        let admin = PermissionId::parse(ADMIN).map_err(wrap(operation))?;
        session
            .require_permission(&admin)
            .await
            .map_err(wrap(operation))
    }

    pub async fn list_users(
        &self,
        session: &AccessSession,
        filter: Option<&str>,
    ) -> Result<Vec<AdminUserInfo>, ServiceError> {
        const OP: &str = "listUsers";
        self.guard(session, OP).await?;
        let principals = self.controller.find_principals(filter).await.map_err(wrap(OP))?;
        Ok(principals.iter().map(AdminUserInfo::from).collect())
    }

    pub async fn create_user(&self, session: &AccessSession, name: &str) -> Result<AdminUserInfo, ServiceError> {
        const OP: &str = "createUser";
        self.guard(session, OP).await?;
        let principal = self.controller.create_principal(name).await.map_err(wrap(OP))?;
        Ok(AdminUserInfo::from(&principal))
    }

    pub async fn delete_user(&self, session: &AccessSession, name: &str) -> Result<(), ServiceError> {
        const OP: &str = "deleteUser";
        self.guard(session, OP).await?;
        self.controller.delete_principal(name).await.map_err(wrap(OP))?;

        if let (Some(sessions), Ok(id)) = (&self.sessions, PrincipalId::parse(name)) {
            let revoked = sessions.revoke_principal(&id).await;
            tracing::info!(principal = %id, revoked, "sessions of deleted user revoked");
        }
        Ok(())
    }

    pub async fn enable_user(
        &self,
        session: &AccessSession,
        name: &str,
        enabled: bool,
    ) -> Result<AdminUserInfo, ServiceError> {
        const OP: &str = "enableUser";
        self.guard(session, OP).await?;
        let principal = self
            .controller
            .set_principal_enabled(name, enabled)
            .await
            .map_err(wrap(OP))?;
        Ok(AdminUserInfo::from(&principal))
    }

    pub async fn list_roles(
        &self,
        session: &AccessSession,
        filter: Option<&str>,
    ) -> Result<Vec<AdminRoleInfo>, ServiceError> {
        const OP: &str = "listRoles";
        self.guard(session, OP).await?;
        let roles = self.controller.find_roles(filter).await.map_err(wrap(OP))?;
        Ok(roles.iter().map(AdminRoleInfo::from).collect())
    }

    pub async fn list_permissions(&self, session: &AccessSession) -> Result<Vec<AdminPermissionInfo>, ServiceError> {
        const OP: &str = "listPermissions";
        self.guard(session, OP).await?;
        Ok(self
            .controller
            .list_all_permissions()
            .iter()
            .map(AdminPermissionInfo::from)
            .collect())
    }

    pub async fn create_role(&self, session: &AccessSession, name: &str) -> Result<AdminRoleInfo, ServiceError> {
        const OP: &str = "createRole";
        self.guard(session, OP).await?;
        let role = self.controller.create_role(name).await.map_err(wrap(OP))?;
        Ok(AdminRoleInfo::from(&role))
    }

    pub async fn delete_role(&self, session: &AccessSession, name: &str) -> Result<(), ServiceError> {
        const OP: &str = "deleteRole";
        self.guard(session, OP).await?;
        self.controller.delete_role(name).await.map_err(wrap(OP))
    }

    pub async fn grant_user_role(&self, session: &AccessSession, user: &str, role: &str) -> Result<(), ServiceError> {
        const OP: &str = "grantUserRole";
        self.guard(session, OP).await?;
        self.controller.grant_role(user, role).await.map_err(wrap(OP))
    }

    pub async fn revoke_user_role(&self, session: &AccessSession, user: &str, role: &str) -> Result<(), ServiceError> {
        const OP: &str = "revokeUserRole";
        self.guard(session, OP).await?;
        self.controller.revoke_role(user, role).await.map_err(wrap(OP))
    }

    pub async fn set_role_permissions(
        &self,
        session: &AccessSession,
        role: &str,
        permissions: &[String],
    ) -> Result<(), ServiceError> {
        const OP: &str = "setRolePermissions";
        self.guard(session, OP).await?;
        self.controller
            .set_role_permissions(role, permissions)
            .await
            .map_err(wrap(OP))
    }

    pub async fn set_user_credentials(
        &self,
        session: &AccessSession,
        provider: &str,
        user: &str,
        credentials: &Credentials,
    ) -> Result<(), ServiceError> {
        const OP: &str = "setUserCredentials";
        self.guard(session, OP).await?;
        self.controller
            .update_credentials(provider, user, credentials)
            .await
            .map_err(wrap(OP))
    }
}
