//! Recording backend double.
//!
//! Delivers whatever block a test pushes to every attached target, without
//! any channel filtering, and records every registry call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tagstream_domain::{ChannelId, TagBlock};
use tagstream_ports::{AttachmentId, MeasurementTarget, TaggerBackend};
use tagstream_shared::{ErrorCode, ErrorEnvelope, Result};

/// One registry call seen by [`RecordingBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryCall {
    /// `register_channel`.
    Register(ChannelId),
    /// `unregister_channel`.
    Unregister(ChannelId),
    /// `attach`.
    Attach(AttachmentId),
    /// `detach`.
    Detach(AttachmentId),
}

#[derive(Default)]
struct Registry {
    calls: Vec<RegistryCall>,
    targets: BTreeMap<AttachmentId, Arc<dyn MeasurementTarget>>,
    next_id: u64,
}

/// Backend double for measurement tests.
#[derive(Default)]
pub struct RecordingBackend {
    unused: BTreeSet<ChannelId>,
    rejected: BTreeSet<ChannelId>,
    registry: Mutex<Registry>,
}

impl RecordingBackend {
    /// Backend where only [`ChannelId::UNUSED`] is unused.
    pub fn new() -> Self {
        Self::default()
    }

    /// Additionally report `channel` as unused.
    pub fn with_unused(mut self, channel: ChannelId) -> Self {
        self.unused.insert(channel);
        self
    }

    /// Fail registration of `channel`.
    pub fn with_rejected(mut self, channel: ChannelId) -> Self {
        self.rejected.insert(channel);
        self
    }

    /// Deliver `block` to every attached target.
    pub fn push(&self, block: &TagBlock) -> Result<()> {
        let targets: Vec<_> = self
            .registry
            .lock()
            .unwrap()
            .targets
            .values()
            .cloned()
            .collect();
        for target in targets {
            target.deliver(block)?;
        }
        Ok(())
    }

    /// Every registry call so far.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.registry.lock().unwrap().calls.clone()
    }

    /// Channels with more registrations than releases.
    pub fn registered_channels(&self) -> BTreeMap<ChannelId, i64> {
        let mut counts = BTreeMap::new();
        for call in self.calls() {
            match call {
                RegistryCall::Register(channel) => *counts.entry(channel).or_insert(0) += 1,
                RegistryCall::Unregister(channel) => *counts.entry(channel).or_insert(0) -= 1,
                RegistryCall::Attach(_) | RegistryCall::Detach(_) => {},
            }
        }
        counts.retain(|_, count| *count != 0);
        counts
    }

    /// Number of attached targets.
    pub fn attached(&self) -> usize {
        self.registry.lock().unwrap().targets.len()
    }
}

impl TaggerBackend for RecordingBackend {
    fn is_unused_channel(&self, channel: ChannelId) -> bool {
        channel.is_unused() || self.unused.contains(&channel)
    }

    fn register_channel(&self, channel: ChannelId) -> Result<()> {
        if self.rejected.contains(&channel) {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("backend", "invalid_channel"),
                "channel rejected by test backend",
            )
            .with_metadata("channel", channel.to_string()));
        }
        self.registry
            .lock()
            .unwrap()
            .calls
            .push(RegistryCall::Register(channel));
        Ok(())
    }

    fn unregister_channel(&self, channel: ChannelId) {
        self.registry
            .lock()
            .unwrap()
            .calls
            .push(RegistryCall::Unregister(channel));
    }

    fn attach(&self, target: Arc<dyn MeasurementTarget>) -> Result<AttachmentId> {
        let mut registry = self.registry.lock().unwrap();
        registry.next_id += 1;
        let id = AttachmentId::new(registry.next_id);
        registry.targets.insert(id, target);
        registry.calls.push(RegistryCall::Attach(id));
        Ok(id)
    }

    fn detach(&self, id: AttachmentId) {
        let mut registry = self.registry.lock().unwrap();
        registry.targets.remove(&id);
        registry.calls.push(RegistryCall::Detach(id));
    }
}
