//! Wiring: directory, controller, providers, sessions and facades.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use gatehouse_auth::{ADMIN, PUBLIC, Principal, Role};
use gatehouse_core::{IamError, PermissionId, PrincipalId, RoleId};
use gatehouse_infra::{
    BootstrapAdmin, ConfigError, DirectorySecurityController, DirectoryStore, DirectoryWrite,
    GatehouseConfig, InMemoryDirectory, LocalPasswordVerifier, SecurityController, SessionManager,
};

use crate::binding::{Facades, FieldRegistry};

/// Name of the role seeded for the bootstrap administrator.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bootstrap failed: {0}")]
    Iam(#[from] IamError),
}

/// Everything a transport needs to serve requests.
#[derive(Clone)]
pub struct Services {
    pub controller: Arc<dyn SecurityController>,
    pub sessions: Arc<SessionManager>,
    pub facades: Arc<Facades>,
    pub registry: Arc<FieldRegistry>,
}

/// Default wiring with the standard-cost local password provider.
pub async fn build_services(config: &GatehouseConfig) -> Result<Services, BootstrapError> {
    build_services_with(config, Arc::new(LocalPasswordVerifier::new())).await
}

pub async fn build_services_with(
    config: &GatehouseConfig,
    local: Arc<LocalPasswordVerifier>,
) -> Result<Services, BootstrapError> {
    let catalog = config.permission_catalog()?;
    let store = Arc::new(InMemoryDirectory::new());

    if let Some(admin) = &config.bootstrap_admin {
        seed_admin(store.as_ref(), &local, admin).await?;
    }

    let controller: Arc<dyn SecurityController> = Arc::new(
        DirectorySecurityController::new(store, catalog, config.controller_settings()).with_verifier(local),
    );
    let sessions = Arc::new(SessionManager::new(controller.clone(), config.session_ttl()));

    tracing::info!(
        role_management = controller.supports_role_management(),
        providers = controller.list_providers().len(),
        "services ready"
    );

    Ok(Services {
        facades: Arc::new(Facades::new(controller.clone()).with_sessions(sessions.clone())),
        registry: Arc::new(FieldRegistry::standard()),
        controller,
        sessions,
    })
}

/// Write the admin role and principal straight into the store.
///
/// Goes around the controller so a deployment without role management
/// still gets an administrator.
async fn seed_admin(
    store: &InMemoryDirectory,
    local: &LocalPasswordVerifier,
    admin: &BootstrapAdmin,
) -> Result<(), IamError> {
    let principal_id = PrincipalId::parse(&admin.user)?;
    let role_id = RoleId::parse(ADMIN_ROLE)?;

    let role = Role::new(role_id.clone())
        .with_label("Administrator")
        .with_permissions([PermissionId::parse(ADMIN)?, PermissionId::parse(PUBLIC)?]);
    let mut principal = Principal::new(principal_id.clone(), Utc::now());
    principal.roles.insert(role_id);

    store
        .commit(vec![DirectoryWrite::PutRole(role), DirectoryWrite::PutPrincipal(principal)])
        .await?;
    local.set_password(&principal_id, &admin.password).await?;

    tracing::info!(principal = %principal_id, "bootstrap administrator seeded");
    Ok(())
}

/// Periodically drop expired and idle sessions.
pub fn spawn_session_sweeper(sessions: Arc<SessionManager>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sessions.purge_expired().await;
        }
    })
}
