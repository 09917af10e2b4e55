//! Fluent construction of tag blocks.

use tagstream_domain::{ChannelId, TagBlock, TagEvent, TagKind, Timestamp};

/// Default start channel used by the builder.
pub const START: ChannelId = ChannelId::new(1);
/// Default click channel used by the builder.
pub const CLICK: ChannelId = ChannelId::new(2);

/// Builds a [`TagBlock`] tag by tag.
#[derive(Debug, Clone)]
pub struct TagStreamBuilder {
    start: ChannelId,
    click: ChannelId,
    tags: Vec<TagEvent>,
}

impl Default for TagStreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TagStreamBuilder {
    /// Builder using [`START`] and [`CLICK`].
    pub const fn new() -> Self {
        Self::with_channels(START, CLICK)
    }

    /// Builder with explicit start/click channels.
    pub const fn with_channels(start: ChannelId, click: ChannelId) -> Self {
        Self {
            start,
            click,
            tags: Vec::new(),
        }
    }

    /// Tag on the start channel.
    pub fn start(self, time: Timestamp) -> Self {
        let channel = self.start;
        self.tag(channel, time)
    }

    /// Tag on the click channel.
    pub fn click(self, time: Timestamp) -> Self {
        let channel = self.click;
        self.tag(channel, time)
    }

    /// Tag on any channel.
    pub fn tag(mut self, channel: ChannelId, time: Timestamp) -> Self {
        self.tags.push(TagEvent::time_tag(channel, time));
        self
    }

    /// Anomaly marker.
    pub fn marker(mut self, kind: TagKind, time: Timestamp) -> Self {
        self.tags.push(TagEvent::marker(kind, time));
        self
    }

    /// Overflow interval: begin marker, missed-events report, end marker.
    pub fn overflow(mut self, begin: Timestamp, end: Timestamp, missed: u16) -> Self {
        let channel = self.click;
        self.tags.push(TagEvent::marker(TagKind::OverflowBegin, begin));
        self.tags.push(TagEvent::missed(channel, missed, begin));
        self.tags.push(TagEvent::marker(TagKind::OverflowEnd, end));
        self
    }

    /// Tags collected so far.
    pub fn tags(&self) -> &[TagEvent] {
        &self.tags
    }

    /// Block covering `[begin, end)`.
    pub fn build_range(self, begin: Timestamp, end: Timestamp) -> TagBlock {
        TagBlock::new(self.tags, begin, end).expect("builder range must not be inverted")
    }

    /// Block covering exactly the collected tags.
    pub fn build(self) -> TagBlock {
        let begin = self.tags.iter().map(|tag| tag.time).min().unwrap_or(0);
        let end = self
            .tags
            .iter()
            .map(|tag| tag.time)
            .max()
            .map_or(begin, |time| time + 1);
        self.build_range(begin, end)
    }
}
