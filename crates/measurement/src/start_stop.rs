//! Custom start-stop histogram measurement.
//!
//! Counts the time between a tag on the start channel and the next tag on
//! the click channel. When the backend reports the start channel as unused,
//! the click channel takes both roles and every click measures the interval
//! since the previous click.

use crate::lifecycle::Measurement;
use crate::processor::{ProcessingStats, TagStreamProcessor};
use std::sync::Arc;
use std::time::Duration;
use tagstream_domain::{
    BinWidth, CaptureDuration, ChannelId, ChannelRoles, HistogramPoint, MeasurementState,
    TagEvent, Timestamp,
};
use tagstream_ports::{MeasurementHooks, TaggerBackend};
use tagstream_shared::Result;

/// Hooks wiring [`TagStreamProcessor`] into the measurement lifecycle.
#[derive(Debug, Clone)]
pub struct StartStopHooks {
    processor: TagStreamProcessor,
}

impl StartStopHooks {
    /// Hooks for the given roles.
    #[must_use]
    pub fn new(roles: ChannelRoles, bin_width: BinWidth) -> Self {
        Self {
            processor: TagStreamProcessor::new(roles, bin_width),
        }
    }

    /// The wrapped processor.
    #[must_use]
    pub const fn processor(&self) -> &TagStreamProcessor {
        &self.processor
    }
}

impl MeasurementHooks for StartStopHooks {
    fn on_start(&mut self) {
        self.processor.reset_pending();
    }

    fn on_clear(&mut self) {
        self.processor.clear();
    }

    fn process(&mut self, tags: &[TagEvent], _begin_time: Timestamp, _end_time: Timestamp) {
        self.processor.process(tags);
    }
}

/// Start-stop histogram attached to a backend.
pub struct CustomStartStop {
    measurement: Measurement<StartStopHooks>,
    roles: ChannelRoles,
    bin_width: BinWidth,
}

impl CustomStartStop {
    /// Register `click` and `start` with `backend` and attach.
    ///
    /// Fails when `bin_width < 1`, when `click` is unused, or when the
    /// backend rejects a channel. An unused `start` selects
    /// self-referential mode.
    pub fn new(
        backend: Arc<dyn TaggerBackend>,
        click: ChannelId,
        start: ChannelId,
        bin_width: i64,
    ) -> Result<Self> {
        let bin_width = BinWidth::new(bin_width)?;
        let roles = ChannelRoles::resolve(click, start, |channel| {
            backend.is_unused_channel(channel)
        })?;
        if roles.is_self_referential() && start != click {
            tracing::debug!(
                click = %click,
                start = %start,
                "start channel unused; click channel opens intervals"
            );
        }

        let measurement = Measurement::new(
            "custom_start_stop",
            backend,
            &roles.distinct(),
            StartStopHooks::new(roles, bin_width),
        )?;
        Ok(Self {
            measurement,
            roles,
            bin_width,
        })
    }

    /// Histogram as `(time, count)` points ascending by time.
    ///
    /// Taken under the instance lock, so it never observes a half-processed
    /// block.
    pub fn get_data(&self) -> Result<Vec<HistogramPoint>> {
        self.measurement.with_hooks(|hooks| hooks.processor().snapshot())
    }

    /// Processing counters since the last clear.
    pub fn stats(&self) -> Result<ProcessingStats> {
        self.measurement.with_hooks(|hooks| hooks.processor().stats())
    }

    /// Histogram and counters from one lock acquisition.
    pub fn snapshot(&self) -> Result<(Vec<HistogramPoint>, ProcessingStats)> {
        self.measurement.with_hooks(|hooks| {
            let processor = hooks.processor();
            (processor.snapshot(), processor.stats())
        })
    }

    /// Resolved channel roles.
    #[must_use]
    pub const fn roles(&self) -> ChannelRoles {
        self.roles
    }

    /// Configured bin width.
    #[must_use]
    pub const fn bin_width(&self) -> BinWidth {
        self.bin_width
    }

    /// See [`Measurement::start`].
    pub fn start(&self) -> Result<()> {
        self.measurement.start()
    }

    /// See [`Measurement::start_for`].
    pub fn start_for(&self, duration: CaptureDuration, clear: bool) -> Result<()> {
        self.measurement.start_for(duration, clear)
    }

    /// See [`Measurement::stop`].
    pub fn stop(&self) -> Result<()> {
        self.measurement.stop()
    }

    /// See [`Measurement::clear`].
    pub fn clear(&self) -> Result<()> {
        self.measurement.clear()
    }

    /// See [`Measurement::is_running`].
    pub fn is_running(&self) -> Result<bool> {
        self.measurement.is_running()
    }

    /// See [`Measurement::state`].
    pub fn state(&self) -> Result<MeasurementState> {
        self.measurement.state()
    }

    /// See [`Measurement::wait_until_finished`].
    pub fn wait_until_finished(&self, timeout: Duration) -> Result<bool> {
        self.measurement.wait_until_finished(timeout)
    }
}
