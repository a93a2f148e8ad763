//! Process-wide tracing setup shared by the gatehouse binaries.

/// Initialize tracing with JSON output, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init("info");
}

pub mod tracing;
