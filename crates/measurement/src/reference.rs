//! Reference start-stop histogram used to cross-check [`CustomStartStop`].
//!
//! Shares no code with the processor: it records raw intervals and bins
//! them only when read.
//!
//! [`CustomStartStop`]: crate::CustomStartStop

use crate::lifecycle::Measurement;
use std::sync::Arc;
use tagstream_domain::{
    BinWidth, ChannelId, ChannelRoles, HistogramPoint, TagEvent, TagKind, Timestamp,
};
use tagstream_ports::{MeasurementHooks, TaggerBackend};
use tagstream_shared::Result;

/// Raw-interval start-stop histogram.
#[derive(Debug, Clone)]
pub struct StartStopReference {
    click: ChannelId,
    start: ChannelId,
    bin_width: BinWidth,
    armed: bool,
    last_start: Timestamp,
    intervals: Vec<i64>,
}

impl StartStopReference {
    /// Empty reference for the given roles.
    #[must_use]
    pub fn new(roles: ChannelRoles, bin_width: BinWidth) -> Self {
        Self {
            click: roles.click(),
            start: roles.start(),
            bin_width,
            armed: false,
            last_start: 0,
            intervals: Vec::new(),
        }
    }

    /// Attach a reference measurement to `backend`.
    pub fn attach(
        backend: Arc<dyn TaggerBackend>,
        roles: ChannelRoles,
        bin_width: BinWidth,
    ) -> Result<Measurement<Self>> {
        Measurement::new(
            "start_stop_reference",
            backend,
            &roles.distinct(),
            Self::new(roles, bin_width),
        )
    }

    /// Histogram as `(time, count)` points ascending by time.
    #[must_use]
    pub fn histogram(&self) -> Vec<HistogramPoint> {
        let mut bins: Vec<i64> = self
            .intervals
            .iter()
            .map(|&interval| self.bin_width.bin_of(interval))
            .collect();
        bins.sort_unstable();

        let mut points: Vec<HistogramPoint> = Vec::new();
        for bin in bins {
            let time = self.bin_width.bin_time(bin);
            match points.last_mut() {
                Some(last) if last.time == time => last.count += 1,
                _ => points.push(HistogramPoint::new(time, 1)),
            }
        }
        points
    }

    fn on_tag(&mut self, tag: &TagEvent) {
        match tag.kind {
            TagKind::TimeTag => {},
            TagKind::Error
            | TagKind::OverflowBegin
            | TagKind::OverflowEnd
            | TagKind::MissedEvents => {
                self.armed = false;
                return;
            },
        }

        let was_armed = self.armed;
        let opened_at = self.last_start;
        if tag.channel == self.click {
            self.armed = false;
        }
        if tag.channel == self.start {
            self.armed = true;
            self.last_start = tag.time;
        }
        if tag.channel != self.click || !was_armed {
            return;
        }
        match tag.time.checked_sub(opened_at) {
            Some(elapsed) if elapsed >= 0 => self.intervals.push(elapsed),
            _ => {},
        }
    }
}

impl MeasurementHooks for StartStopReference {
    fn on_start(&mut self) {
        self.armed = false;
    }

    fn on_clear(&mut self) {
        self.armed = false;
        self.intervals.clear();
    }

    fn process(&mut self, tags: &[TagEvent], _begin_time: Timestamp, _end_time: Timestamp) {
        for tag in tags {
            self.on_tag(tag);
        }
    }
}
