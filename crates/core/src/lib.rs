//! `gatehouse-core`: shared identity primitives.
//!
//! Identifiers and the error taxonomy every other crate speaks. No IO here.

pub mod error;
pub mod id;

pub use error::{ErrorKind, IamError, IamResult};
pub use id::{PermissionId, PrincipalId, RoleId, SessionToken};
