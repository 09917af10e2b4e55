//! Measurement lifecycle: channel registration, start/stop/clear, capture
//! windows and teardown, all serialized by one instance lock.

use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use tagstream_domain::{CaptureDuration, ChannelId, MeasurementState, TagBlock, Timestamp};
use tagstream_ports::{AttachmentId, MeasurementHooks, MeasurementTarget, TaggerBackend};
use tagstream_shared::{InstanceLock, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureWindow {
    Unbounded,
    /// Opens at the begin time of the next delivered block.
    Armed(CaptureDuration),
    /// Tags at or after this time are not processed.
    Until(Timestamp),
}

struct Slot<H> {
    state: MeasurementState,
    window: CaptureWindow,
    hooks: H,
}

impl<H: MeasurementHooks> Slot<H> {
    fn begin_running(&mut self, window: CaptureWindow) {
        self.window = window;
        if !self.state.is_running() {
            self.hooks.on_start();
            self.state = MeasurementState::Running;
        }
    }

    /// Returns true when the call actually stopped a run.
    fn end_running(&mut self) -> bool {
        self.window = CaptureWindow::Unbounded;
        if !self.state.is_running() {
            return false;
        }
        self.hooks.on_stop();
        self.state = MeasurementState::Idle;
        true
    }

    /// Process one block; returns true when the capture window closed.
    fn deliver(&mut self, block: &TagBlock) -> bool {
        let tags = block.tags();
        let until = match self.window {
            CaptureWindow::Unbounded => {
                self.hooks.process(tags, block.begin_time(), block.end_time());
                return false;
            },
            CaptureWindow::Armed(duration) => {
                let until = duration.end_from(block.begin_time());
                self.window = CaptureWindow::Until(until);
                until
            },
            CaptureWindow::Until(until) => until,
        };

        let cut = tags.partition_point(|tag| tag.time < until);
        let (inside, _) = tags.split_at(cut);
        self.hooks.process(inside, block.begin_time(), block.end_time().min(until));

        block.end_time() >= until && self.end_running()
    }
}

/// Lock-guarded state shared between a [`Measurement`] and its backend.
pub(crate) struct MeasurementCell<H> {
    lock: InstanceLock<Slot<H>>,
}

impl<H: MeasurementHooks> MeasurementCell<H> {
    const fn new(name: &'static str, hooks: H) -> Self {
        Self {
            lock: InstanceLock::new(
                name,
                Slot {
                    state: MeasurementState::Constructed,
                    window: CaptureWindow::Unbounded,
                    hooks,
                },
            ),
        }
    }

    fn slot(&self) -> Result<MutexGuard<'_, Slot<H>>> {
        self.lock.lock()
    }
}

impl<H: MeasurementHooks> MeasurementTarget for MeasurementCell<H> {
    fn deliver(&self, block: &TagBlock) -> Result<()> {
        let mut slot = self.slot()?;
        if !slot.state.is_running() {
            return Ok(());
        }
        if slot.deliver(block) {
            self.lock.notify_all();
            tracing::info!(
                measurement = self.lock.name(),
                end_time = block.end_time(),
                "capture window complete"
            );
        }
        Ok(())
    }
}

/// A measurement attached to a backend, driving `H` under its instance lock.
pub struct Measurement<H: MeasurementHooks> {
    cell: Arc<MeasurementCell<H>>,
    backend: Arc<dyn TaggerBackend>,
    channels: Vec<ChannelId>,
    attachment: Option<AttachmentId>,
}

impl<H: MeasurementHooks> Measurement<H> {
    /// Register `channels`, reset `hooks` and attach to `backend`.
    ///
    /// The measurement is idle afterwards; call [`Self::start`] to process.
    pub fn new(
        name: &'static str,
        backend: Arc<dyn TaggerBackend>,
        channels: &[ChannelId],
        hooks: H,
    ) -> Result<Self> {
        let mut measurement = Self {
            cell: Arc::new(MeasurementCell::new(name, hooks)),
            backend,
            channels: Vec::with_capacity(channels.len()),
            attachment: None,
        };

        // Partial registrations are released by `Drop` on early return.
        for &channel in channels {
            if measurement.channels.contains(&channel) {
                continue;
            }
            measurement.backend.register_channel(channel)?;
            measurement.channels.push(channel);
        }

        measurement.cell.slot()?.hooks.on_clear();

        let target: Arc<dyn MeasurementTarget> = measurement.cell.clone();
        measurement.attachment = Some(measurement.backend.attach(target)?);
        measurement.cell.slot()?.state = MeasurementState::Idle;

        tracing::debug!(
            measurement = name,
            channels = ?measurement.channels,
            "measurement attached"
        );
        Ok(measurement)
    }

    /// Start processing until [`Self::stop`]. No-op while already running.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.cell.slot()?;
        if slot.state.is_running() {
            return Ok(());
        }
        slot.begin_running(CaptureWindow::Unbounded);
        tracing::debug!(measurement = self.name(), "measurement started");
        Ok(())
    }

    /// Process `duration` ticks of stream time, counted from the first block
    /// delivered after this call, then stop.
    ///
    /// With `clear`, accumulated data is dropped first. Calling this while
    /// running re-arms the window without restarting.
    pub fn start_for(&self, duration: CaptureDuration, clear: bool) -> Result<()> {
        let mut slot = self.cell.slot()?;
        if clear {
            slot.hooks.on_clear();
        }
        slot.begin_running(CaptureWindow::Armed(duration));
        tracing::debug!(
            measurement = self.name(),
            duration = duration.get(),
            clear,
            "capture window armed"
        );
        Ok(())
    }

    /// Stop processing. Waits for an in-flight block to finish.
    pub fn stop(&self) -> Result<()> {
        let mut slot = self.cell.slot()?;
        if slot.end_running() {
            self.cell.lock.notify_all();
            tracing::debug!(measurement = self.name(), "measurement stopped");
        }
        Ok(())
    }

    /// Drop accumulated data. Allowed in any state.
    pub fn clear(&self) -> Result<()> {
        self.cell.slot()?.hooks.on_clear();
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Result<MeasurementState> {
        Ok(self.cell.slot()?.state)
    }

    /// True while tags are processed.
    pub fn is_running(&self) -> Result<bool> {
        Ok(self.state()?.is_running())
    }

    /// Block until the measurement is no longer running, up to `timeout`.
    ///
    /// Returns `true` when it stopped in time.
    pub fn wait_until_finished(&self, timeout: Duration) -> Result<bool> {
        let slot = self.cell.slot()?;
        let (_slot, finished) = self
            .cell
            .lock
            .wait_while(slot, timeout, |slot| slot.state.is_running())?;
        Ok(finished)
    }

    /// Run `read` against the hooks while holding the instance lock.
    pub fn with_hooks<R>(&self, read: impl FnOnce(&H) -> R) -> Result<R> {
        let slot = self.cell.slot()?;
        Ok(read(&slot.hooks))
    }

    /// Channels registered with the backend.
    #[must_use]
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Diagnostic name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.cell.lock.name()
    }
}

impl<H: MeasurementHooks> Drop for Measurement<H> {
    fn drop(&mut self) {
        {
            let mut slot = self.cell.lock.lock_recovering();
            slot.end_running();
            slot.state = MeasurementState::Stopped;
            self.cell.lock.notify_all();
        }
        if let Some(attachment) = self.attachment.take() {
            self.backend.detach(attachment);
        }
        for channel in self.channels.drain(..) {
            self.backend.unregister_channel(channel);
        }
        tracing::debug!(measurement = self.name(), "measurement released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tagstream_domain::TagEvent;

    #[derive(Default)]
    struct Calls {
        log: Vec<&'static str>,
        processed: Vec<Timestamp>,
    }

    struct TraceHooks(Arc<Mutex<Calls>>);

    impl TraceHooks {
        fn record(&self, call: &'static str) {
            if let Ok(mut calls) = self.0.lock() {
                calls.log.push(call);
            }
        }
    }

    impl MeasurementHooks for TraceHooks {
        fn on_start(&mut self) {
            self.record("start");
        }

        fn on_stop(&mut self) {
            self.record("stop");
        }

        fn on_clear(&mut self) {
            self.record("clear");
        }

        fn process(&mut self, tags: &[TagEvent], _begin: Timestamp, _end: Timestamp) {
            if let Ok(mut calls) = self.0.lock() {
                calls.processed.extend(tags.iter().map(|tag| tag.time));
            }
        }
    }

    #[derive(Default)]
    struct NullBackend {
        targets: Mutex<Vec<Arc<dyn MeasurementTarget>>>,
    }

    impl NullBackend {
        fn push(&self, block: &TagBlock) -> Result<()> {
            let targets = self.targets.lock().map(|targets| targets.clone()).unwrap_or_default();
            for target in targets {
                target.deliver(block)?;
            }
            Ok(())
        }
    }

    impl TaggerBackend for NullBackend {
        fn is_unused_channel(&self, channel: ChannelId) -> bool {
            channel.is_unused()
        }

        fn register_channel(&self, _channel: ChannelId) -> Result<()> {
            Ok(())
        }

        fn unregister_channel(&self, _channel: ChannelId) {}

        fn attach(&self, target: Arc<dyn MeasurementTarget>) -> Result<AttachmentId> {
            if let Ok(mut targets) = self.targets.lock() {
                targets.push(target);
            }
            Ok(AttachmentId::new(1))
        }

        fn detach(&self, _id: AttachmentId) {
            if let Ok(mut targets) = self.targets.lock() {
                targets.clear();
            }
        }
    }

    fn block(times: &[Timestamp], begin: Timestamp, end: Timestamp) -> Result<TagBlock> {
        let tags = times
            .iter()
            .map(|&time| TagEvent::time_tag(ChannelId::new(1), time))
            .collect();
        Ok(TagBlock::new(tags, begin, end)?)
    }

    fn setup() -> Result<(Arc<NullBackend>, Arc<Mutex<Calls>>, Measurement<TraceHooks>)> {
        let backend = Arc::new(NullBackend::default());
        let calls = Arc::new(Mutex::new(Calls::default()));
        let measurement = Measurement::new(
            "trace",
            backend.clone(),
            &[ChannelId::new(1), ChannelId::new(1)],
            TraceHooks(Arc::clone(&calls)),
        )?;
        Ok((backend, calls, measurement))
    }

    fn log(calls: &Mutex<Calls>) -> Vec<&'static str> {
        calls.lock().map(|calls| calls.log.clone()).unwrap_or_default()
    }

    fn processed(calls: &Mutex<Calls>) -> Vec<Timestamp> {
        calls.lock().map(|calls| calls.processed.clone()).unwrap_or_default()
    }

    #[test]
    fn construction_clears_and_idles() -> Result<()> {
        let (_backend, calls, measurement) = setup()?;
        assert_eq!(measurement.state()?, MeasurementState::Idle);
        assert_eq!(measurement.channels(), &[ChannelId::new(1)]);
        assert_eq!(log(&calls), vec!["clear"]);
        Ok(())
    }

    #[test]
    fn idle_measurement_ignores_blocks() -> Result<()> {
        let (backend, calls, _measurement) = setup()?;
        backend.push(&block(&[1, 2], 0, 10)?)?;
        assert!(processed(&calls).is_empty());
        Ok(())
    }

    #[test]
    fn start_is_idempotent_and_stop_notifies_once() -> Result<()> {
        let (backend, calls, measurement) = setup()?;
        measurement.start()?;
        measurement.start()?;
        backend.push(&block(&[5], 0, 10)?)?;
        measurement.stop()?;
        measurement.stop()?;
        assert!(!measurement.is_running()?);
        assert_eq!(log(&calls), vec!["clear", "start", "stop"]);
        assert_eq!(processed(&calls), vec![5]);
        Ok(())
    }

    #[test]
    fn capture_window_cuts_block_and_stops() -> Result<()> {
        let (backend, calls, measurement) = setup()?;
        measurement.start_for(CaptureDuration::new(100)?, true)?;
        backend.push(&block(&[10, 60], 0, 80)?)?;
        assert!(measurement.is_running()?);
        backend.push(&block(&[90, 99, 100, 150], 80, 160)?)?;

        assert!(!measurement.is_running()?);
        assert!(measurement.wait_until_finished(Duration::from_millis(1))?);
        assert_eq!(processed(&calls), vec![10, 60, 90, 99]);
        assert_eq!(log(&calls), vec!["clear", "clear", "start", "stop"]);

        backend.push(&block(&[170], 160, 200)?)?;
        assert_eq!(processed(&calls).len(), 4);
        Ok(())
    }

    #[test]
    fn window_opens_at_first_block() -> Result<()> {
        let (backend, calls, measurement) = setup()?;
        measurement.start_for(CaptureDuration::new(50)?, false)?;
        backend.push(&block(&[1_000, 1_049, 1_050], 1_000, 1_100)?)?;
        assert!(!measurement.is_running()?);
        assert_eq!(processed(&calls), vec![1_000, 1_049]);
        Ok(())
    }

    #[test]
    fn wait_times_out_while_running() -> Result<()> {
        let (_backend, _calls, measurement) = setup()?;
        measurement.start()?;
        assert!(!measurement.wait_until_finished(Duration::from_millis(5))?);
        Ok(())
    }

    #[test]
    fn drop_stops_and_detaches() -> Result<()> {
        let (backend, calls, measurement) = setup()?;
        measurement.start()?;
        drop(measurement);
        assert_eq!(log(&calls), vec!["clear", "start", "stop"]);
        assert!(backend.targets.lock().map(|targets| targets.is_empty()).unwrap_or(false));
        Ok(())
    }
}
