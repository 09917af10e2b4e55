//! Deterministic synthetic tag stream.
//!
//! Emits a start pulse every `period` ticks and a stop pulse `stop_delay`
//! ticks later, shifted by a bounded pseudo-random jitter that only depends
//! on the pulse index. Blocks are contiguous, so block `n` always contains
//! the same tags no matter how the stream is consumed.

use tagstream_domain::{ChannelId, TagBlock, TagEvent, TagKind, Timestamp};
use tagstream_shared::{ErrorCode, ErrorEnvelope, Result};

const JITTER_STRIDE: i64 = 7919;

/// Shape of the generated signal. All durations are in ticks (ps).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSpec {
    /// Channel carrying the start pulses.
    pub start_channel: ChannelId,
    /// Channel carrying the delayed stop pulses.
    pub stop_channel: ChannelId,
    /// Distance between consecutive start pulses.
    pub period: i64,
    /// Nominal start-to-stop delay.
    pub stop_delay: i64,
    /// Maximum absolute deviation from `stop_delay`.
    pub jitter: i64,
    /// Stream time covered by one block.
    pub block_duration: i64,
    /// Every n-th block loses its first half to an overflow.
    pub overflow_every_blocks: Option<u32>,
    /// Channel receiving one unrelated pulse per period, mid-way.
    pub noise_channel: Option<ChannelId>,
}

impl Default for SignalSpec {
    fn default() -> Self {
        Self {
            start_channel: ChannelId::new(1),
            stop_channel: ChannelId::new(2),
            period: 1_250_000,
            stop_delay: 2_000,
            jitter: 100,
            block_duration: 1_000_000_000,
            overflow_every_blocks: None,
            noise_channel: None,
        }
    }
}

impl SignalSpec {
    /// Start-to-stop interval of pulse `index`.
    #[must_use]
    pub const fn interval(&self, index: i64) -> i64 {
        self.stop_delay + jitter_offset(index, self.jitter)
    }

    fn validate(&self) -> Result<()> {
        let checks: [(&str, bool, &str); 8] = [
            ("period", self.period >= 2, "must be at least 2"),
            ("blockDuration", self.block_duration >= 1, "must be positive"),
            ("stopDelay", self.stop_delay >= 0, "must not be negative"),
            ("jitter", self.jitter >= 0, "must not be negative"),
            ("jitter", self.jitter <= self.stop_delay, "must not exceed stopDelay"),
            (
                "stopDelay",
                self.stop_delay.saturating_add(self.jitter) < self.period,
                "stopDelay + jitter must stay below period",
            ),
            (
                "overflowEveryBlocks",
                self.overflow_every_blocks.is_none_or(|every| every >= 1),
                "must be positive",
            ),
            (
                "stopChannel",
                self.start_channel != self.stop_channel,
                "must differ from startChannel",
            ),
        ];
        if let Some((field, _, reason)) = checks.iter().find(|(_, ok, _)| !ok) {
            return Err(invalid_signal(field, reason));
        }

        let mut channels = vec![
            ("startChannel", self.start_channel),
            ("stopChannel", self.stop_channel),
        ];
        if let Some(noise) = self.noise_channel {
            channels.push(("noiseChannel", noise));
        }
        for (field, channel) in channels {
            if channel.get() == 0 || channel.is_unused() {
                return Err(invalid_signal(field, "must be a real input channel"));
            }
        }
        Ok(())
    }
}

fn invalid_signal(field: &str, reason: &str) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("source", "invalid_signal"),
        format!("signal {field} {reason}"),
    )
    .with_metadata("field", field)
    .with_metadata("reason", reason)
}

const fn jitter_offset(index: i64, jitter: i64) -> i64 {
    if jitter == 0 {
        return 0;
    }
    index.wrapping_mul(JITTER_STRIDE).rem_euclid(2 * jitter + 1) - jitter
}

/// Infinite iterator of contiguous [`TagBlock`]s following a [`SignalSpec`].
///
/// Ends only when block times would overflow [`Timestamp`].
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    spec: SignalSpec,
    next_block: u64,
}

impl SyntheticSource {
    /// Validate `spec` and position the source at block 0.
    pub fn new(spec: SignalSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            next_block: 0,
        })
    }

    /// Signal shape.
    #[must_use]
    pub const fn spec(&self) -> &SignalSpec {
        &self.spec
    }

    /// Block `index`, covering `[index * block_duration, (index + 1) * block_duration)`.
    #[must_use]
    pub fn block(&self, index: u64) -> Option<TagBlock> {
        let spec = &self.spec;
        let begin = i64::try_from(index).ok()?.checked_mul(spec.block_duration)?;
        let end = begin.checked_add(spec.block_duration)?;

        let mut tags = self.pulses(begin, end);
        let overflowing = spec
            .overflow_every_blocks
            .is_some_and(|every| (index + 1) % u64::from(every) == 0);
        if overflowing {
            tags = self.overflow(tags, begin, end);
        }
        TagBlock::new(tags, begin, end).ok()
    }

    fn pulses(&self, begin: Timestamp, end: Timestamp) -> Vec<TagEvent> {
        let spec = &self.spec;
        let first = (begin / spec.period - 1).max(0);
        let last = end / spec.period + 1;

        let mut tags = Vec::new();
        let mut push = |channel: ChannelId, time: Timestamp| {
            if (begin..end).contains(&time) {
                tags.push(TagEvent::time_tag(channel, time));
            }
        };
        for index in first..=last {
            let Some(start) = index.checked_mul(spec.period) else {
                break;
            };
            push(spec.start_channel, start);
            push(spec.stop_channel, start + spec.interval(index));
            if let Some(noise) = spec.noise_channel {
                push(noise, start + spec.period / 2);
            }
        }
        tags.sort_by_key(|tag| tag.time);
        tags
    }

    fn overflow(&self, tags: Vec<TagEvent>, begin: Timestamp, end: Timestamp) -> Vec<TagEvent> {
        let resume = begin + (end - begin) / 2;
        let (lost, kept): (Vec<TagEvent>, Vec<TagEvent>) =
            tags.into_iter().partition(|tag| tag.time < resume);
        let missed = u16::try_from(lost.len()).unwrap_or(u16::MAX);

        tracing::debug!(begin, resume, missed, "injecting overflow");
        let mut overflowed = Vec::with_capacity(kept.len() + 3);
        overflowed.push(TagEvent::marker(TagKind::OverflowBegin, begin));
        overflowed.push(TagEvent::missed(self.spec.stop_channel, missed, begin));
        overflowed.push(TagEvent::marker(TagKind::OverflowEnd, resume));
        overflowed.extend(kept);
        overflowed
    }
}

impl Iterator for SyntheticSource {
    type Item = TagBlock;

    fn next(&mut self) -> Option<TagBlock> {
        let block = self.block(self.next_block)?;
        self.next_block += 1;
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn small_spec() -> SignalSpec {
        SignalSpec {
            period: 1_000,
            stop_delay: 100,
            jitter: 0,
            block_duration: 2_500,
            ..SignalSpec::default()
        }
    }

    fn times_on(block: &TagBlock, channel: i32) -> Vec<Timestamp> {
        block
            .tags()
            .iter()
            .filter(|tag| tag.kind.is_time_tag() && tag.channel == ChannelId::new(channel))
            .map(|tag| tag.time)
            .collect()
    }

    #[test]
    fn invalid_signals_are_rejected() {
        let cases = [
            SignalSpec {
                jitter: 200,
                ..small_spec()
            },
            SignalSpec {
                period: 1,
                ..small_spec()
            },
            SignalSpec {
                stop_delay: 1_000,
                ..small_spec()
            },
            SignalSpec {
                stop_channel: ChannelId::new(1),
                ..small_spec()
            },
            SignalSpec {
                noise_channel: Some(ChannelId::UNUSED),
                ..small_spec()
            },
            SignalSpec {
                overflow_every_blocks: Some(0),
                ..small_spec()
            },
        ];
        for spec in cases {
            let error = SyntheticSource::new(spec).err();
            assert_eq!(
                error.map(|error| error.code),
                Some(ErrorCode::new("source", "invalid_signal")),
                "{spec:?}"
            );
        }
    }

    #[test]
    fn blocks_are_contiguous_and_deterministic() -> Result<(), Box<dyn Error>> {
        let mut source = SyntheticSource::new(small_spec())?;
        let first = source.next().ok_or("missing block 0")?;
        let second = source.next().ok_or("missing block 1")?;

        assert_eq!((first.begin_time(), first.end_time()), (0, 2_500));
        assert_eq!((second.begin_time(), second.end_time()), (2_500, 5_000));
        assert_eq!(times_on(&first, 1), vec![0, 1_000, 2_000]);
        assert_eq!(times_on(&first, 2), vec![100, 1_100, 2_100]);
        assert_eq!(times_on(&second, 1), vec![3_000, 4_000]);
        assert_eq!(times_on(&second, 2), vec![3_100, 4_100]);
        assert_eq!(source.block(1), Some(second));
        Ok(())
    }

    #[test]
    fn jitter_stays_bounded_and_tags_stay_ordered() -> Result<(), Box<dyn Error>> {
        let spec = SignalSpec {
            period: 1_000,
            stop_delay: 300,
            jitter: 40,
            block_duration: 777,
            noise_channel: Some(ChannelId::new(3)),
            ..SignalSpec::default()
        };
        let source = SyntheticSource::new(spec)?;
        let blocks: Vec<TagBlock> = source.take(40).collect();

        let mut starts = Vec::new();
        let mut stops = Vec::new();
        let mut noise = 0;
        for block in &blocks {
            assert!(block.tags().windows(2).all(|pair| pair[0].time <= pair[1].time));
            assert!(
                block
                    .tags()
                    .iter()
                    .all(|tag| (block.begin_time()..block.end_time()).contains(&tag.time))
            );
            starts.extend(times_on(block, 1));
            stops.extend(times_on(block, 2));
            noise += times_on(block, 3).len();
        }

        assert_eq!(starts.len(), 32);
        assert_eq!(stops.len(), 31);
        assert_eq!(noise, 31);
        for (start, stop) in starts.iter().zip(&stops) {
            let interval = stop - start;
            assert!((260..=340).contains(&interval), "interval {interval}");
            assert_eq!(interval, spec.interval(start / spec.period));
        }
        Ok(())
    }

    #[test]
    fn overflow_replaces_first_half_of_block() -> Result<(), Box<dyn Error>> {
        let spec = SignalSpec {
            overflow_every_blocks: Some(2),
            ..small_spec()
        };
        let source = SyntheticSource::new(spec)?;
        let clean = source.block(0).ok_or("missing block 0")?;
        let overflowed = source.block(1).ok_or("missing block 1")?;

        assert!(clean.tags().iter().all(|tag| tag.kind.is_time_tag()));

        let kinds: Vec<TagKind> = overflowed.tags().iter().take(3).map(|tag| tag.kind).collect();
        assert_eq!(
            kinds,
            vec![TagKind::OverflowBegin, TagKind::MissedEvents, TagKind::OverflowEnd]
        );
        assert_eq!(overflowed.tags()[1].missed_events, 2);
        assert_eq!(overflowed.tags()[2].time, 3_750);
        assert_eq!(times_on(&overflowed, 1), vec![4_000]);
        assert_eq!(times_on(&overflowed, 2), vec![4_100]);
        Ok(())
    }
}
