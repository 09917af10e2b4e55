//! Domain primitives with validated constructors.

use serde::{Deserialize, Serialize};
use std::fmt;
use tagstream_shared::{ErrorCode, ErrorEnvelope};

/// Time in ticks (picoseconds on real hardware).
pub type Timestamp = i64;

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `BinWidth` must be at least one tick.
    NonPositiveBinWidth {
        /// Rejected raw value.
        value: i64,
    },
    /// The click channel was reported unused by the backend.
    UnusedClickChannel {
        /// Rejected channel.
        channel: ChannelId,
    },
    /// A block ends before it begins.
    InvertedBlockRange {
        /// Block begin time.
        begin_time: Timestamp,
        /// Block end time.
        end_time: Timestamp,
    },
    /// A capture window must span at least one tick.
    NonPositiveDuration {
        /// Rejected raw value.
        value: i64,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::NonPositiveBinWidth { .. } => ErrorCode::new("domain", "invalid_bin_width"),
            Self::UnusedClickChannel { .. } => ErrorCode::new("domain", "invalid_channel"),
            Self::InvertedBlockRange { .. } => ErrorCode::new("domain", "invalid_block_range"),
            Self::NonPositiveDuration { .. } => ErrorCode::new("domain", "invalid_duration"),
        }
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveBinWidth { .. } => formatter.write_str("binwidth must be at least 1"),
            Self::UnusedClickChannel { .. } => {
                formatter.write_str("click channel must be a used input channel")
            },
            Self::InvertedBlockRange { .. } => {
                formatter.write_str("block end_time must be >= begin_time")
            },
            Self::NonPositiveDuration { .. } => {
                formatter.write_str("capture duration must be at least 1")
            },
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            PrimitiveError::NonPositiveBinWidth { value }
            | PrimitiveError::NonPositiveDuration { value } => {
                envelope.with_metadata("value", value.to_string())
            },
            PrimitiveError::UnusedClickChannel { channel } => {
                envelope.with_metadata("channel", channel.to_string())
            },
            PrimitiveError::InvertedBlockRange {
                begin_time,
                end_time,
            } => envelope
                .with_metadata("begin_time", begin_time.to_string())
                .with_metadata("end_time", end_time.to_string()),
        }
    }
}

/// Input channel number. Negative values select the falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(i32);

impl ChannelId {
    /// Sentinel for "no channel".
    pub const UNUSED: Self = Self(-134_217_728);

    /// Wrap a raw channel number.
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw channel number.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// True for the [`Self::UNUSED`] sentinel.
    #[must_use]
    pub const fn is_unused(self) -> bool {
        self.0 == Self::UNUSED.0
    }

    /// True when the channel listens on a falling edge.
    #[must_use]
    pub const fn is_falling_edge(self) -> bool {
        self.0 < 0 && !self.is_unused()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unused() {
            formatter.write_str("unused")
        } else {
            write!(formatter, "{}", self.0)
        }
    }
}

/// Positive histogram bin width in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct BinWidth(i64);

impl BinWidth {
    /// Validate a raw bin width.
    pub const fn new(value: i64) -> Result<Self, PrimitiveError> {
        if value < 1 {
            return Err(PrimitiveError::NonPositiveBinWidth { value });
        }
        Ok(Self(value))
    }

    /// Width in ticks.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Bin index for a non-negative elapsed time (truncating division).
    #[must_use]
    pub const fn bin_of(self, elapsed: Timestamp) -> i64 {
        elapsed / self.0
    }

    /// Left edge of `bin` in ticks.
    #[must_use]
    pub const fn bin_time(self, bin: i64) -> Timestamp {
        bin.saturating_mul(self.0)
    }
}

impl TryFrom<i64> for BinWidth {
    type Error = PrimitiveError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BinWidth> for i64 {
    fn from(width: BinWidth) -> Self {
        width.0
    }
}

impl fmt::Display for BinWidth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Length of a capture window in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CaptureDuration(i64);

impl CaptureDuration {
    /// Validate a raw duration.
    pub const fn new(value: i64) -> Result<Self, PrimitiveError> {
        if value < 1 {
            return Err(PrimitiveError::NonPositiveDuration { value });
        }
        Ok(Self(value))
    }

    /// Duration in ticks.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Exclusive end of a window opened at `begin`.
    #[must_use]
    pub const fn end_from(self, begin: Timestamp) -> Timestamp {
        begin.saturating_add(self.0)
    }
}

impl TryFrom<i64> for CaptureDuration {
    type Error = PrimitiveError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CaptureDuration> for i64 {
    fn from(duration: CaptureDuration) -> Self {
        duration.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bin_width_rejects_zero_and_negative() {
        assert!(matches!(
            BinWidth::new(0),
            Err(PrimitiveError::NonPositiveBinWidth { value: 0 })
        ));
        assert!(BinWidth::new(-5).is_err());
        assert_eq!(BinWidth::new(1).map(BinWidth::get), Ok(1));
    }

    #[test]
    fn bin_of_truncates() -> Result<(), PrimitiveError> {
        let width = BinWidth::new(50)?;
        assert_eq!(width.bin_of(300), 6);
        assert_eq!(width.bin_of(349), 6);
        assert_eq!(width.bin_of(0), 0);
        assert_eq!(width.bin_time(6), 300);
        Ok(())
    }

    #[test]
    fn unused_sentinel_is_not_a_falling_edge() {
        assert!(ChannelId::UNUSED.is_unused());
        assert!(!ChannelId::UNUSED.is_falling_edge());
        assert!(ChannelId::new(-2).is_falling_edge());
        assert_eq!(ChannelId::UNUSED.to_string(), "unused");
        assert_eq!(ChannelId::new(3).to_string(), "3");
    }

    #[test]
    fn bin_width_deserializes_through_validation() {
        assert!(serde_json::from_str::<BinWidth>("0").is_err());
        assert_eq!(
            serde_json::from_str::<BinWidth>("25").ok(),
            BinWidth::new(25).ok()
        );
    }

    #[test]
    fn capture_duration_end_saturates() -> Result<(), PrimitiveError> {
        let duration = CaptureDuration::new(10)?;
        assert_eq!(duration.end_from(5), 15);
        assert_eq!(duration.end_from(i64::MAX - 1), i64::MAX);
        assert!(CaptureDuration::new(0).is_err());
        Ok(())
    }

    proptest! {
        #[test]
        fn bin_edges_bracket_elapsed(width in 1_i64..10_000, elapsed in 0_i64..1_000_000_000) {
            let width = BinWidth::new(width).map_err(|error| TestCaseError::fail(error.to_string()))?;
            let bin = width.bin_of(elapsed);
            prop_assert!(width.bin_time(bin) <= elapsed);
            prop_assert!(elapsed < width.bin_time(bin + 1));
        }
    }
}
