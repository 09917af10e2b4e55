//! # tagstream-domain
//!
//! Domain model for start-stop histogramming of time-tag streams.
//!
//! - **Primitives** - `ChannelId`, `Timestamp`, `BinWidth`, `CaptureDuration`
//! - **Tags** - `TagKind`, `TagEvent`, `TagBlock`
//! - **Roles** - `ChannelRoles` (click/start assignment)
//! - **Histogram** - `HistogramPoint`
//! - **States** - `MeasurementState`
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use tagstream_shared::shared_crate_version;

pub mod histogram;
pub mod primitives;
pub mod roles;
pub mod states;
pub mod tags;

pub use histogram::{HistogramPoint, peak, total_counts};
pub use primitives::{BinWidth, CaptureDuration, ChannelId, PrimitiveError, Timestamp};
pub use roles::ChannelRoles;
pub use states::MeasurementState;
pub use tags::{TagBlock, TagEvent, TagKind};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        let version = domain_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn domain_depends_on_shared() {
        let shared_version = shared_crate_version();
        assert!(!shared_version.is_empty());
    }
}
