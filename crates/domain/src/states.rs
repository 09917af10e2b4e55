//! Measurement lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a measurement.
///
/// `Constructed -> Idle <-> Running -> Stopped`. `Stopped` is terminal and
/// only reached on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementState {
    /// Channels are being registered.
    Constructed,
    /// Ready; tags are ignored.
    Idle,
    /// Tags are processed.
    Running,
    /// Torn down; never processes again.
    Stopped,
}

impl MeasurementState {
    /// Canonical identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    /// True while tags are being processed.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// True once teardown has begun.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for MeasurementState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn only_running_processes() {
        assert!(MeasurementState::Running.is_running());
        assert!(!MeasurementState::Idle.is_running());
        assert!(MeasurementState::Stopped.is_terminal());
    }

    #[test]
    fn state_serializes_snake_case() -> Result<(), Box<dyn Error>> {
        let value = serde_json::to_value(MeasurementState::Running)?;
        assert_eq!(value, serde_json::json!("running"));
        assert_eq!(MeasurementState::Idle.to_string(), "idle");
        Ok(())
    }
}
