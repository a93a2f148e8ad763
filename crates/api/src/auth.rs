//! Authentication facade: login, logout and "who am I".

use std::sync::Arc;

use serde::Serialize;

use gatehouse_auth::{Credentials, Principal, ProviderDescriptor};
use gatehouse_infra::{AccessSession, SecurityController};

use crate::error::{ServiceError, wrap};

/// The caller's principal as seen through its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserInfo {
    pub name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

pub struct AuthService {
    controller: Arc<dyn SecurityController>,
}

impl AuthService {
    pub fn new(controller: Arc<dyn SecurityController>) -> Self {
        Self { controller }
    }

    /// Verify credentials and bind `session` to the resulting principal.
    ///
    /// On failure the session is anonymous afterwards, whatever it was before.
    pub async fn login(
        &self,
        session: &AccessSession,
        provider: &str,
        credentials: &Credentials,
    ) -> Result<SessionUserInfo, ServiceError> {
        const OP: &str = "authLogin";
        let principal = session
            .authenticate(provider, credentials)
            .await
            .inspect_err(|e| tracing::warn!(session = %session.token(), provider, error = %e, "login failed"))
            .map_err(wrap(OP))?;
        self.describe(session, principal, OP).await
    }

    pub async fn logout(&self, session: &AccessSession) -> Result<(), ServiceError> {
        session.logout().await;
        Ok(())
    }

    pub async fn session_user(&self, session: &AccessSession) -> Result<Option<SessionUserInfo>, ServiceError> {
        const OP: &str = "sessionUser";
        match session.current_principal().await.map_err(wrap(OP))? {
            Some(principal) => self.describe(session, principal, OP).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn list_providers(&self) -> Vec<ProviderDescriptor> {
        self.controller.list_providers()
    }

    async fn describe(
        &self,
        session: &AccessSession,
        principal: Principal,
        operation: &'static str,
    ) -> Result<SessionUserInfo, ServiceError> {
        let permissions = session.effective_permissions().await.map_err(wrap(operation))?;
        Ok(SessionUserInfo {
            name: principal.id.to_string(),
            roles: principal.roles.iter().map(|r| r.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_auth::SessionPhase;
    use gatehouse_core::ErrorKind;

    use super::*;
    use crate::testing::{self, ADMIN_PASSWORD, ADMIN_USER};

    fn creds(user: &str, password: &str) -> Credentials {
        Credentials::new().with("user", user).with("password", password)
    }

    #[tokio::test]
    async fn login_then_logout_twice() {
        let services = testing::services().await;
        let auth = &services.facades.auth;
        let session = services.sessions.open();

        let me = auth
            .login(&session, "local", &creds(ADMIN_USER, ADMIN_PASSWORD))
            .await
            .unwrap();
        assert_eq!(me.name, ADMIN_USER);
        assert_eq!(me.roles, vec!["admin".to_string()]);
        assert_eq!(me.permissions, vec!["admin".to_string(), "public".to_string()]);
        assert_eq!(auth.session_user(&session).await.unwrap(), Some(me));

        auth.logout(&session).await.unwrap();
        auth.logout(&session).await.unwrap();
        assert_eq!(session.phase().await, SessionPhase::Anonymous);
        assert_eq!(auth.session_user(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn wrong_password_leaves_session_anonymous() {
        let services = testing::services().await;
        let auth = &services.facades.auth;
        let session = services.sessions.open();

        let err = auth
            .login(&session, "local", &creds(ADMIN_USER, "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.operation, "authLogin");
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(session.phase().await, SessionPhase::Anonymous);
        assert_eq!(auth.session_user(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_relogin_drops_previous_binding() {
        let services = testing::services().await;
        let auth = &services.facades.auth;
        let session = testing::admin_session(&services).await;

        let err = auth
            .login(&session, "kerberos", &creds(ADMIN_USER, ADMIN_PASSWORD))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownProvider);
        assert_eq!(auth.session_user(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn providers_are_listed() {
        let services = testing::services().await;
        let ids: Vec<String> = services
            .facades
            .auth
            .list_providers()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["local".to_string()]);
    }
}
