//! # tagstream-testkit
//!
//! Test doubles, tag stream builders, and fixtures.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod backend;
pub mod errors;
pub mod stream;
pub mod telemetry;

pub use backend::{RecordingBackend, RegistryCall};
pub use stream::{CLICK, START, TagStreamBuilder};
pub use telemetry::{CaptureTelemetry, CapturedMetric};

use std::path::PathBuf;

/// Path of a config fixture under `fixtures/config`.
pub fn config_fixture(name: &str) -> PathBuf {
    fixtures_dir().join("config").join(name)
}

/// Path of an env map fixture under `fixtures/env`.
pub fn env_fixture(name: &str) -> PathBuf {
    fixtures_dir().join("env").join(name)
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Returns the testkit crate version.
#[must_use]
pub const fn testkit_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagstream_domain::TagKind;
    use tagstream_ports::{TaggerBackend, TelemetryPort};

    #[test]
    fn testkit_crate_compiles() {
        assert!(!testkit_crate_version().is_empty());
    }

    #[test]
    fn error_fixtures_are_available() {
        let codes = errors::common_error_codes();
        assert!(!codes.is_empty());
        assert!(errors::lock_poisoned_error().is_invariant());
    }

    #[test]
    fn builder_spans_collected_tags() {
        let block = TagStreamBuilder::new()
            .start(100)
            .marker(TagKind::Error, 150)
            .click(250)
            .build();
        assert_eq!(block.begin_time(), 100);
        assert_eq!(block.end_time(), 251);
        assert_eq!(block.len(), 3);
    }

    #[test]
    fn recording_backend_tracks_registrations() {
        let backend = RecordingBackend::new().with_unused(tagstream_domain::ChannelId::new(9));
        assert!(backend.is_unused_channel(tagstream_domain::ChannelId::new(9)));
        backend.register_channel(CLICK).unwrap();
        backend.register_channel(CLICK).unwrap();
        backend.unregister_channel(CLICK);
        assert_eq!(backend.registered_channels().get(&CLICK), Some(&1));
    }

    #[test]
    fn capture_telemetry_sums_counters() {
        let telemetry = CaptureTelemetry::new();
        telemetry.increment_counter("a", 2, None);
        telemetry.increment_counter("a", 3, None);
        telemetry.start_timer("t", None).stop();
        assert_eq!(telemetry.counter("a"), 5);
        assert!(telemetry.has_timer("t"));
    }

    #[test]
    fn config_fixtures_exist() {
        assert!(config_fixture("app-config.default.toml").is_file());
        assert!(env_fixture("app-env.valid.json").is_file());
    }
}
