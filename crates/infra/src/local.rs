//! Local username/password provider (Argon2 PHC hashes kept in memory).
//!
//! Hashing and verification run on the blocking pool so a caller's timeout
//! can abandon them.

use std::collections::HashMap;
use std::sync::RwLock;

use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use async_trait::async_trait;
use password_hash::{PasswordHash, SaltString};

use gatehouse_auth::{AuthFailure, CredentialVerifier, Credentials, ProviderDescriptor};
use gatehouse_core::PrincipalId;

pub const PROVIDER_ID: &str = "local";

const USER_FIELD: &str = "user";
const PASSWORD_FIELD: &str = "password";

/// Salt for the throwaway hash computed when the user is unknown.
const DECOY_SALT: &str = "gatehousedecoysalt";

pub struct LocalPasswordVerifier {
    hasher: Argon2<'static>,
    hashes: RwLock<HashMap<PrincipalId, String>>,
}

fn backend(e: impl std::fmt::Display) -> AuthFailure {
    AuthFailure::Backend(e.to_string())
}

async fn run_blocking<T, F>(job: F) -> Result<T, AuthFailure>
where
    F: FnOnce() -> Result<T, AuthFailure> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(backend)?
}

impl LocalPasswordVerifier {
    /// Argon2id with the library's default cost.
    pub fn new() -> Self {
        Self {
            hasher: Argon2::default(),
            hashes: RwLock::new(HashMap::new()),
        }
    }

    /// Argon2id with explicit memory (KiB), iteration and lane counts.
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthFailure> {
        let params = Params::new(m_cost, t_cost, p_cost, None).map_err(backend)?;
        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            hashes: RwLock::new(HashMap::new()),
        })
    }

    /// Store (or replace) the password of a principal.
    pub async fn set_password(&self, principal: &PrincipalId, password: &str) -> Result<(), AuthFailure> {
        if password.is_empty() {
            return Err(AuthFailure::Malformed("password cannot be empty".to_string()));
        }

        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(backend)?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(backend)?;

        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let phc = run_blocking(move || {
            hasher
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(backend)
        })
        .await?;

        let mut hashes = self
            .hashes
            .write()
            .map_err(|_| AuthFailure::Backend("lock poisoned".to_string()))?;
        hashes.insert(principal.clone(), phc);
        Ok(())
    }

    fn stored_hash(&self, principal: &PrincipalId) -> Result<Option<String>, AuthFailure> {
        let hashes = self
            .hashes
            .read()
            .map_err(|_| AuthFailure::Backend("lock poisoned".to_string()))?;
        Ok(hashes.get(principal).cloned())
    }
}

impl Default for LocalPasswordVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialVerifier for LocalPasswordVerifier {
    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: PROVIDER_ID.to_string(),
            label: "Local".to_string(),
            description: "Local user name and password".to_string(),
        }
    }

    async fn verify(&self, credentials: &Credentials) -> Result<PrincipalId, AuthFailure> {
        let user = credentials.require(USER_FIELD)?;
        let password = credentials.require(PASSWORD_FIELD)?.to_owned();
        let principal = PrincipalId::parse(user).ok();
        let stored = match &principal {
            Some(id) => self.stored_hash(id)?,
            None => None,
        };

        let hasher = self.hasher.clone();
        let matched = run_blocking(move || match stored {
            Some(phc) => {
                let parsed = PasswordHash::new(&phc).map_err(backend)?;
                Ok(hasher.verify_password(password.as_bytes(), &parsed).is_ok())
            }
            None => {
                // Unknown users cost a full hash too.
                let salt = SaltString::from_b64(DECOY_SALT).map_err(backend)?;
                hasher.hash_password(password.as_bytes(), &salt).map_err(backend)?;
                Ok(false)
            }
        })
        .await?;

        match principal {
            Some(id) if matched => Ok(id),
            _ => Err(AuthFailure::InvalidCredentials),
        }
    }

    async fn update_credentials(
        &self,
        principal: &PrincipalId,
        credentials: &Credentials,
    ) -> Result<(), AuthFailure> {
        let password = credentials.require(PASSWORD_FIELD)?;
        self.set_password(principal, password).await
    }

    async fn forget(&self, principal: &PrincipalId) -> Result<(), AuthFailure> {
        let mut hashes = self
            .hashes
            .write()
            .map_err(|_| AuthFailure::Backend("lock poisoned".to_string()))?;
        hashes.remove(principal);
        Ok(())
    }
}
