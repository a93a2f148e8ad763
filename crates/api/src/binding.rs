//! Named-field binding of the facades.
//!
//! A transport hands over a field name, the caller's session and a JSON
//! argument object; the registry returns JSON data or a [`ServiceError`].
//! Nothing here knows about HTTP.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use gatehouse_auth::Credentials;
use gatehouse_core::IamError;
use gatehouse_infra::{AccessSession, SecurityController, SessionManager};

use crate::admin::AdminService;
use crate::auth::AuthService;
use crate::error::ServiceError;

/// The facades a resolver may call.
pub struct Facades {
    pub admin: AdminService,
    pub auth: AuthService,
}

impl Facades {
    pub fn new(controller: Arc<dyn SecurityController>) -> Self {
        Self {
            admin: AdminService::new(controller.clone()),
            auth: AuthService::new(controller),
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionManager>) -> Self {
        self.admin = self.admin.with_sessions(sessions);
        self
    }
}

pub type FieldFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ServiceError>> + Send + 'a>>;

pub type Resolver = for<'a> fn(&'a Facades, &'a AccessSession, Value) -> FieldFuture<'a>;

pub struct FieldRegistry {
    resolvers: BTreeMap<&'static str, Resolver>,
}

impl FieldRegistry {
    pub fn empty() -> Self {
        Self {
            resolvers: BTreeMap::new(),
        }
    }

    /// Registry with every auth and admin field.
    pub fn standard() -> Self {
        Self::empty()
            .register("authLogin", auth_login)
            .register("authLogout", auth_logout)
            .register("sessionUser", session_user)
            .register("authProviders", auth_providers)
            .register("listUsers", list_users)
            .register("createUser", create_user)
            .register("deleteUser", delete_user)
            .register("enableUser", enable_user)
            .register("listRoles", list_roles)
            .register("listPermissions", list_permissions)
            .register("createRole", create_role)
            .register("deleteRole", delete_role)
            .register("grantUserRole", grant_user_role)
            .register("revokeUserRole", revoke_user_role)
            .register("setRolePermissions", set_role_permissions)
            .register("setUserCredentials", set_user_credentials)
    }

    pub fn register(mut self, field: &'static str, resolver: Resolver) -> Self {
        self.resolvers.insert(field, resolver);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resolvers.keys().copied()
    }

    pub async fn resolve(
        &self,
        facades: &Facades,
        session: &AccessSession,
        field: &str,
        args: Value,
    ) -> Result<Value, ServiceError> {
        let Some(resolver) = self.resolvers.get(field) else {
            return Err(ServiceError::new("query", IamError::not_found("field", field)));
        };
        tracing::debug!(session = %session.token(), field, "resolving field");
        resolver(facades, session, args).await
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Decode a field's arguments. A missing (`null`) argument object reads as `{}`.
fn args<T: DeserializeOwned>(field: &'static str, raw: Value) -> Result<T, ServiceError> {
    let raw = match raw {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(raw)
        .map_err(|e| ServiceError::new(field, IamError::validation(format!("arguments: {e}"))))
}

fn to_json<T: serde::Serialize>(field: &'static str, value: T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::new(field, IamError::internal(e.to_string())))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginArgs {
    provider: String,
    #[serde(default)]
    credentials: Credentials,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterArgs {
    #[serde(default)]
    filter: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NameArgs {
    name: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EnableArgs {
    name: String,
    enabled: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MembershipArgs {
    user: String,
    role: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RolePermissionsArgs {
    role: String,
    permissions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UserCredentialsArgs {
    provider: String,
    user: String,
    credentials: Credentials,
}

fn auth_login<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "authLogin";
        let a: LoginArgs = args(FIELD, raw)?;
        let user = f.auth.login(s, &a.provider, &a.credentials).await?;
        to_json(FIELD, user)
    })
}

fn auth_logout<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "authLogout";
        let _: NoArgs = args(FIELD, raw)?;
        f.auth.logout(s).await?;
        Ok(Value::Bool(true))
    })
}

fn session_user<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "sessionUser";
        let _: NoArgs = args(FIELD, raw)?;
        let user = f.auth.session_user(s).await?;
        to_json(FIELD, user)
    })
}

fn auth_providers<'a>(f: &'a Facades, _s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "authProviders";
        let _: NoArgs = args(FIELD, raw)?;
        to_json(FIELD, f.auth.list_providers())
    })
}

fn list_users<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "listUsers";
        let a: FilterArgs = args(FIELD, raw)?;
        let users = f.admin.list_users(s, a.filter.as_deref()).await?;
        to_json(FIELD, users)
    })
}

fn create_user<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "createUser";
        let a: NameArgs = args(FIELD, raw)?;
        let user = f.admin.create_user(s, &a.name).await?;
        to_json(FIELD, user)
    })
}

fn delete_user<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "deleteUser";
        let a: NameArgs = args(FIELD, raw)?;
        f.admin.delete_user(s, &a.name).await?;
        Ok(Value::Bool(true))
    })
}

fn enable_user<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "enableUser";
        let a: EnableArgs = args(FIELD, raw)?;
        let user = f.admin.enable_user(s, &a.name, a.enabled).await?;
        to_json(FIELD, user)
    })
}

fn list_roles<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "listRoles";
        let a: FilterArgs = args(FIELD, raw)?;
        let roles = f.admin.list_roles(s, a.filter.as_deref()).await?;
        to_json(FIELD, roles)
    })
}

fn list_permissions<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "listPermissions";
        let _: NoArgs = args(FIELD, raw)?;
        let permissions = f.admin.list_permissions(s).await?;
        to_json(FIELD, permissions)
    })
}

fn create_role<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "createRole";
        let a: NameArgs = args(FIELD, raw)?;
        let role = f.admin.create_role(s, &a.name).await?;
        to_json(FIELD, role)
    })
}

fn delete_role<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "deleteRole";
        let a: NameArgs = args(FIELD, raw)?;
        f.admin.delete_role(s, &a.name).await?;
        Ok(Value::Bool(true))
    })
}

fn grant_user_role<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "grantUserRole";
        let a: MembershipArgs = args(FIELD, raw)?;
        f.admin.grant_user_role(s, &a.user, &a.role).await?;
        Ok(Value::Bool(true))
    })
}

fn revoke_user_role<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "revokeUserRole";
        let a: MembershipArgs = args(FIELD, raw)?;
        f.admin.revoke_user_role(s, &a.user, &a.role).await?;
        Ok(Value::Bool(true))
    })
}

fn set_role_permissions<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "setRolePermissions";
        let a: RolePermissionsArgs = args(FIELD, raw)?;
        f.admin.set_role_permissions(s, &a.role, &a.permissions).await?;
        Ok(Value::Bool(true))
    })
}

fn set_user_credentials<'a>(f: &'a Facades, s: &'a AccessSession, raw: Value) -> FieldFuture<'a> {
    Box::pin(async move {
        const FIELD: &str = "setUserCredentials";
        let a: UserCredentialsArgs = args(FIELD, raw)?;
        f.admin
            .set_user_credentials(s, &a.provider, &a.user, &a.credentials)
            .await?;
        Ok(Value::Bool(true))
    })
}
