use std::sync::Arc;

use gatehouse_core::SessionToken;
use gatehouse_infra::AccessSession;

/// The caller's access session, attached to each request by the session middleware.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session: Arc<AccessSession>,
}

impl SessionContext {
    pub fn new(session: Arc<AccessSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &AccessSession {
        &self.session
    }

    pub fn token(&self) -> SessionToken {
        self.session.token()
    }
}
