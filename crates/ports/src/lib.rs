//! # tagstream-ports
//!
//! Port traits for the tagstream hexagonal architecture.
//!
//! This crate defines the interfaces between measurements and the
//! infrastructure that feeds them. It depends only on `domain` and `shared`.

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod backend;
pub mod hooks;
pub mod telemetry;

pub use backend::*;
pub use hooks::*;
pub use telemetry::*;

// Re-export selected domain types used in port signatures, so adapter crates
// can implement ports without directly depending on `tagstream-domain`.
pub use tagstream_domain::{ChannelId, TagBlock, TagEvent, Timestamp};
