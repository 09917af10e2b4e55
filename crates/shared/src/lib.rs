//! # tagstream-shared
//!
//! Error handling and locking primitives shared by every tagstream crate.
//!
//! - `ErrorEnvelope` and the workspace `Result` alias
//! - `InstanceLock`, the per-measurement mutex + condvar pair
//!
//! ## Design Principles
//!
//! 1. **No workspace dependencies** - This crate only depends on external crates
//! 2. **Serde-compatible** - Error types serialize for JSON output

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod errors;
pub mod lock;

pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata, Result};
pub use lock::{InstanceLock, lock_poisoned_code};

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
