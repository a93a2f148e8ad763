//! `gatehouse-auth`: pure access-control model.
//!
//! Principals, roles, the permission catalog, effective-permission
//! resolution and the session state machine. Decoupled from storage and
//! transport; credential checking is only a contract here.

pub mod authorize;
pub mod credentials;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;

pub use authorize::{authorize, resolve_effective_permissions};
pub use credentials::{AuthFailure, CredentialVerifier, Credentials, ProviderDescriptor};
pub use permissions::{Permission, PermissionCatalog, PermissionSet, ADMIN, PUBLIC};
pub use principal::{Principal, PrincipalStatus};
pub use roles::Role;
pub use session::{SessionBinding, SessionPhase, SessionState};
