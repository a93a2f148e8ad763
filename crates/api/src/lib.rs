//! Admin and auth facades over the security controller, plus their HTTP binding.

pub mod admin;
pub mod app;
pub mod auth;
pub mod binding;
pub mod context;
pub mod error;
pub mod middleware;

pub use admin::{AdminPermissionInfo, AdminRoleInfo, AdminService, AdminUserInfo};
pub use auth::{AuthService, SessionUserInfo};
pub use binding::{Facades, FieldRegistry};
pub use error::ServiceError;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use gatehouse_auth::Credentials;
    use gatehouse_infra::{AccessSession, BootstrapAdmin, GatehouseConfig, LocalPasswordVerifier, PermissionSpec};

    use crate::app::services::{self, Services};

    pub const ADMIN_USER: &str = "root";
    pub const ADMIN_PASSWORD: &str = "root-pw";

    /// Services with a seeded administrator, `DB_CONNECT` in the catalog and cheap hashing.
    pub async fn services() -> Services {
        let config = GatehouseConfig {
            permissions: vec![PermissionSpec {
                id: "DB_CONNECT".to_string(),
                category: Some("database".to_string()),
                description: None,
            }],
            bootstrap_admin: Some(BootstrapAdmin {
                user: ADMIN_USER.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            }),
            ..GatehouseConfig::default()
        };
        let local = Arc::new(LocalPasswordVerifier::with_cost(8, 1, 1).unwrap());
        services::build_services_with(&config, local).await.unwrap()
    }

    pub async fn admin_session(services: &Services) -> Arc<AccessSession> {
        let session = services.sessions.open();
        session
            .authenticate(
                "local",
                &Credentials::new().with("user", ADMIN_USER).with("password", ADMIN_PASSWORD),
            )
            .await
            .unwrap();
        session
    }
}
