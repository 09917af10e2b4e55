//! # tagstream-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `measurement`, `adapters`, `config`, and `shared`.

/// Acquisition runner (backend, source, measurements).
pub mod acquisition;
/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Telemetry wiring.
pub mod observability;

pub use acquisition::{AcquisitionReport, run_acquisition, signal_spec};
pub use config_check::{load_effective_config, load_effective_config_json};
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use observability::{build_json_telemetry, telemetry_from_config};
pub use tagstream_measurement::ProcessingStats;

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagstream_adapters::adapters_crate_version;
    use tagstream_config::config_crate_version;
    use tagstream_measurement::measurement_crate_version;
    use tagstream_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;
        let mut in_dev_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                in_dev_deps = line == "[dev-dependencies]";
                continue;
            }
            if !(in_deps || in_dev_deps) {
                continue;
            }
            if line.starts_with("tagstream-") {
                let key = line.split('=').next().unwrap_or("").trim();
                let name = key.split('.').next().unwrap_or("").trim();
                deps.push(name.to_string());
            }
        }

        deps
    }

    #[test]
    fn infra_depends_on_measurement_adapters_config() {
        let deps = workspace_deps();
        let required = [
            "tagstream-measurement",
            "tagstream-adapters",
            "tagstream-config",
        ];

        for expected in required {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn infra_can_use_measurement_adapters_config_shared() {
        assert!(!infra_crate_version().is_empty());
        assert!(!measurement_crate_version().is_empty());
        assert!(!adapters_crate_version().is_empty());
        assert!(!config_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
