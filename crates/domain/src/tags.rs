//! Time-tag events and the blocks the backend delivers them in.

use crate::primitives::{ChannelId, PrimitiveError, Timestamp};
use serde::{Deserialize, Serialize};

/// What a tag record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// A regular detection event.
    TimeTag,
    /// The stream reported an internal error.
    Error,
    /// The device started dropping tags.
    OverflowBegin,
    /// The device resumed delivering tags.
    OverflowEnd,
    /// Tags were lost on `channel` while overflowing.
    MissedEvents,
}

impl TagKind {
    /// True for regular detection events.
    #[must_use]
    pub const fn is_time_tag(self) -> bool {
        matches!(self, Self::TimeTag)
    }

    /// True for every kind that signals a gap in the stream.
    #[must_use]
    pub const fn is_anomaly(self) -> bool {
        !self.is_time_tag()
    }
}

/// A single record of the tag stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEvent {
    /// Record kind.
    pub kind: TagKind,
    /// Number of lost tags; only meaningful for [`TagKind::MissedEvents`].
    pub missed_events: u16,
    /// Input channel.
    pub channel: ChannelId,
    /// Event time.
    pub time: Timestamp,
}

impl TagEvent {
    /// Regular detection event on `channel` at `time`.
    #[must_use]
    pub const fn time_tag(channel: ChannelId, time: Timestamp) -> Self {
        Self {
            kind: TagKind::TimeTag,
            missed_events: 0,
            channel,
            time,
        }
    }

    /// Stream anomaly marker not tied to a channel.
    #[must_use]
    pub const fn marker(kind: TagKind, time: Timestamp) -> Self {
        Self {
            kind,
            missed_events: 0,
            channel: ChannelId::UNUSED,
            time,
        }
    }

    /// Report of `count` tags lost on `channel`.
    #[must_use]
    pub const fn missed(channel: ChannelId, count: u16, time: Timestamp) -> Self {
        Self {
            kind: TagKind::MissedEvents,
            missed_events: count,
            channel,
            time,
        }
    }
}

/// A contiguous slice of the stream covering `[begin_time, end_time)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagBlock {
    tags: Vec<TagEvent>,
    begin_time: Timestamp,
    end_time: Timestamp,
}

impl TagBlock {
    /// Build a block; tags are expected in arrival order.
    pub fn new(
        tags: Vec<TagEvent>,
        begin_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<Self, PrimitiveError> {
        if end_time < begin_time {
            return Err(PrimitiveError::InvertedBlockRange {
                begin_time,
                end_time,
            });
        }
        Ok(Self {
            tags,
            begin_time,
            end_time,
        })
    }

    /// Tags in arrival order.
    #[must_use]
    pub fn tags(&self) -> &[TagEvent] {
        &self.tags
    }

    /// Start of the covered range.
    #[must_use]
    pub const fn begin_time(&self) -> Timestamp {
        self.begin_time
    }

    /// Exclusive end of the covered range.
    #[must_use]
    pub const fn end_time(&self) -> Timestamp {
        self.end_time
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True when the block carries no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Same range, keeping only the tags `keep` accepts.
    #[must_use]
    pub fn filtered(&self, keep: impl FnMut(&TagEvent) -> bool) -> Self {
        Self {
            tags: self.tags.iter().copied().filter(keep).collect(),
            begin_time: self.begin_time,
            end_time: self.end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn only_time_tags_are_data() {
        assert!(TagKind::TimeTag.is_time_tag());
        for kind in [
            TagKind::Error,
            TagKind::OverflowBegin,
            TagKind::OverflowEnd,
            TagKind::MissedEvents,
        ] {
            assert!(kind.is_anomaly());
        }
    }

    #[test]
    fn block_rejects_inverted_range() {
        let error = TagBlock::new(Vec::new(), 10, 5).err();
        assert_eq!(
            error,
            Some(PrimitiveError::InvertedBlockRange {
                begin_time: 10,
                end_time: 5
            })
        );
    }

    #[test]
    fn filtered_keeps_range() -> Result<(), Box<dyn Error>> {
        let block = TagBlock::new(
            vec![
                TagEvent::time_tag(ChannelId::new(1), 1),
                TagEvent::time_tag(ChannelId::new(3), 2),
                TagEvent::marker(TagKind::OverflowBegin, 3),
            ],
            0,
            100,
        )?;
        let kept = block.filtered(|tag| tag.channel != ChannelId::new(3));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.begin_time(), 0);
        assert_eq!(kept.end_time(), 100);
        Ok(())
    }

    #[test]
    fn tag_event_serialization_shape() -> Result<(), Box<dyn Error>> {
        let value = serde_json::to_value(TagEvent::missed(ChannelId::new(2), 4, 77))?;
        assert_eq!(
            value,
            serde_json::json!({
                "kind": "missed_events",
                "missedEvents": 4,
                "channel": 2,
                "time": 77
            })
        );
        Ok(())
    }
}
