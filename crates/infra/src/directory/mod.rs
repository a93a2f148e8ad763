//! Durable directory of principals and roles.
//!
//! The security controller owns the records; this module only defines the
//! access contract and an in-memory backend for tests/dev.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryDirectory;
pub use r#trait::{DirectoryStore, DirectoryWrite, StoreError};
