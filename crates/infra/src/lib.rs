//! Infrastructure layer: directory store, security controller, sessions,
//! credential providers and configuration.

pub mod config;
pub mod controller;
pub mod directory;
pub mod local;
pub mod session;

pub use config::{BootstrapAdmin, ConfigError, GatehouseConfig, PermissionSpec};
pub use controller::{ControllerSettings, DirectorySecurityController, ResolvedAccess, SecurityController};
pub use directory::{DirectoryStore, DirectoryWrite, InMemoryDirectory, StoreError};
pub use local::LocalPasswordVerifier;
pub use session::{AccessSession, SessionManager};
