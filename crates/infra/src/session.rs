//! Access sessions: per-caller binding of a principal to its effective
//! permissions.
//!
//! A session never trusts its cached permission set blindly. Every access
//! compares the cached `access_revision` with the principal's current one
//! and recomputes on mismatch, so role changes are visible on the very next
//! call. A principal that is deleted, re-created or disabled drops the
//! binding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

use gatehouse_auth::{
    Credentials, PermissionSet, Principal, SessionBinding, SessionPhase, SessionState, authorize,
};
use gatehouse_core::{IamError, IamResult, PermissionId, PrincipalId, SessionToken};

use crate::controller::{ResolvedAccess, SecurityController};

pub struct AccessSession {
    token: SessionToken,
    created_at: DateTime<Utc>,
    /// Unix millis of the last registry lookup.
    last_seen: AtomicI64,
    ttl: chrono::Duration,
    controller: Arc<dyn SecurityController>,
    state: Mutex<SessionState>,
}

impl core::fmt::Debug for AccessSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessSession")
            .field("token", &self.token)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Holds the state lock for a login attempt. An attempt that is dropped
/// before it binds (cancelled request, outer timeout) leaves the session
/// anonymous.
struct PendingLogin<'a>(MutexGuard<'a, SessionState>);

impl Drop for PendingLogin<'_> {
    fn drop(&mut self) {
        if self.0.phase() == SessionPhase::Authenticating {
            self.0.reset();
        }
    }
}

impl AccessSession {
    /// Anonymous session; `ttl` bounds each authenticated window and how
    /// long the session may sit idle in a [`SessionManager`].
    pub fn new(controller: Arc<dyn SecurityController>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: SessionToken::generate(),
            created_at: now,
            last_seen: AtomicI64::new(now.timestamp_millis()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
            controller,
            state: Mutex::new(SessionState::Anonymous),
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn touch(&self) {
        self.last_seen.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// No registry lookup for at least `ttl`.
    fn is_idle(&self, now: DateTime<Utc>) -> bool {
        let idle_ms = now.timestamp_millis().saturating_sub(self.last_seen.load(Ordering::Relaxed));
        idle_ms >= self.ttl.num_milliseconds()
    }

    pub async fn phase(&self) -> SessionPhase {
        let mut state = self.state.lock().await;
        state.expire_if_due(Utc::now());
        state.phase()
    }

    /// Verify credentials and bind the session to the resulting principal.
    ///
    /// Any previous binding is replaced. On failure, or if the call is
    /// dropped midway, the session is left anonymous.
    pub async fn authenticate(&self, provider: &str, credentials: &Credentials) -> IamResult<Principal> {
        let mut pending = PendingLogin(self.state.lock().await);
        pending.0.begin_authentication();

        let outcome: IamResult<ResolvedAccess> = async {
            let principal = self.controller.verify_credentials(provider, credentials).await?;
            self.controller
                .resolve_access(&principal.id)
                .await?
                .ok_or(IamError::InvalidCredentials)
        }
        .await;

        match outcome {
            Ok(access) => {
                let now = Utc::now();
                pending.0.bind(SessionBinding {
                    principal_id: access.principal.id.clone(),
                    incarnation: access.principal.incarnation,
                    provider: provider.to_string(),
                    permissions: access.permissions,
                    access_revision: access.principal.access_revision,
                    authenticated_at: now,
                    expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
                })?;
                tracing::info!(session = %self.token, principal = %access.principal.id, provider, "session authenticated");
                Ok(access.principal)
            }
            Err(e) => {
                pending.0.reset();
                Err(e)
            }
        }
    }

    /// Drop the binding. A no-op on an anonymous session.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        if let Some(binding) = state.binding() {
            tracing::info!(session = %self.token, principal = %binding.principal_id, "session logged out");
        }
        state.reset();
    }

    /// Drop the binding if it belongs to `principal`.
    pub async fn revoke_if_bound(&self, principal: &PrincipalId) -> bool {
        let mut state = self.state.lock().await;
        if !state.binding().is_some_and(|b| &b.principal_id == principal) {
            return false;
        }
        tracing::info!(session = %self.token, %principal, "session revoked");
        state.reset();
        true
    }

    pub async fn current_principal(&self) -> IamResult<Option<Principal>> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await
    }

    /// Permissions of the bound principal; empty when anonymous.
    pub async fn effective_permissions(&self) -> IamResult<PermissionSet> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await?;
        Ok(state.permissions())
    }

    pub async fn has_permission(&self, permission: &PermissionId) -> IamResult<bool> {
        Ok(self.effective_permissions().await?.contains(permission))
    }

    /// `Forbidden` unless the session currently holds `permission`.
    pub async fn require_permission(&self, permission: &PermissionId) -> IamResult<()> {
        let permissions = self.effective_permissions().await?;
        authorize(&permissions, permission).inspect_err(|_| {
            tracing::warn!(session = %self.token, %permission, "permission denied");
        })
    }

    /// Re-validate the binding against the controller.
    async fn refresh(&self, state: &mut SessionState) -> IamResult<Option<Principal>> {
        if state.expire_if_due(Utc::now()) {
            tracing::info!(session = %self.token, "session expired");
            return Ok(None);
        }
        let Some((principal_id, incarnation, cached_revision)) = state
            .binding()
            .map(|b| (b.principal_id.clone(), b.incarnation, b.access_revision))
        else {
            return Ok(None);
        };

        let current = match self.controller.find_principal(&principal_id).await? {
            Some(p) if p.is_active() && p.incarnation == incarnation => p,
            _ => {
                tracing::info!(session = %self.token, principal = %principal_id, "session binding invalidated");
                state.reset();
                return Ok(None);
            }
        };
        if current.access_revision == cached_revision {
            return Ok(Some(current));
        }

        match self.controller.resolve_access(&principal_id).await? {
            Some(access) if access.principal.is_active() && access.principal.incarnation == incarnation => {
                if let Some(binding) = state.binding_mut() {
                    binding.permissions = access.permissions;
                    binding.access_revision = access.principal.access_revision;
                }
                tracing::debug!(
                    session = %self.token,
                    principal = %principal_id,
                    revision = access.principal.access_revision,
                    "session permissions recomputed"
                );
                Ok(Some(access.principal))
            }
            _ => {
                state.reset();
                Ok(None)
            }
        }
    }
}

/// Token-addressed registry of live sessions.
pub struct SessionManager {
    controller: Arc<dyn SecurityController>,
    ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Arc<AccessSession>>>,
}

impl SessionManager {
    pub fn new(controller: Arc<dyn SecurityController>, ttl: Duration) -> Self {
        Self {
            controller,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a fresh anonymous session.
    pub fn open(&self) -> Arc<AccessSession> {
        let session = Arc::new(AccessSession::new(self.controller.clone(), self.ttl));
        if let Ok(mut map) = self.sessions.write() {
            map.insert(session.token(), session.clone());
        }
        session
    }

    /// Look up a session and mark it as seen.
    pub fn get(&self, token: &SessionToken) -> Option<Arc<AccessSession>> {
        let map = self.sessions.read().ok()?;
        let session = map.get(token).cloned()?;
        session.touch();
        Some(session)
    }

    /// Existing session for `token`, or a new anonymous one.
    pub fn get_or_open(&self, token: Option<SessionToken>) -> Arc<AccessSession> {
        token
            .and_then(|t| self.get(&t))
            .unwrap_or_else(|| self.open())
    }

    pub fn close(&self, token: &SessionToken) -> bool {
        match self.sessions.write() {
            Ok(mut map) => map.remove(token).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<AccessSession>> {
        match self.sessions.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Unbind every session of `principal`. The sessions stay registered as
    /// anonymous.
    pub async fn revoke_principal(&self, principal: &PrincipalId) -> usize {
        let mut revoked = 0;
        for session in self.snapshot() {
            if session.revoke_if_bound(principal).await {
                revoked += 1;
            }
        }
        revoked
    }

    /// Drop every session whose authenticated window has closed or that
    /// has not been looked up for a whole ttl.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut stale = Vec::new();
        for session in self.snapshot() {
            if session.is_idle(now) || session.phase().await == SessionPhase::Expired {
                stale.push(session.token());
            }
        }

        let purged = match self.sessions.write() {
            Ok(mut map) => stale.iter().filter(|t| map.remove(t).is_some()).count(),
            Err(_) => 0,
        };
        if purged > 0 {
            tracing::info!(purged, "stale sessions purged");
        }
        purged
    }
}
