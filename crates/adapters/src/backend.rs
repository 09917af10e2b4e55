//! In-process tagger backend.
//!
//! Keeps a reference-counted channel registry, hands every delivered block
//! to the attached measurements one at a time, and drops tags from channels
//! nobody registered. Anomaly markers always pass the filter.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tagstream_domain::{ChannelId, TagBlock};
use tagstream_ports::{AttachmentId, MeasurementTarget, TaggerBackend};
use tagstream_shared::{ErrorCode, ErrorEnvelope, InstanceLock, Result};

/// Delivery counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Blocks passed to [`InProcessBackend::deliver`].
    pub blocks: u64,
    /// Tags handed to measurements after filtering.
    pub tags: u64,
    /// Tags dropped because no measurement registered their channel.
    pub filtered: u64,
    /// Target deliveries that returned an error.
    pub failures: u64,
}

#[derive(Default)]
struct Registry {
    channels: FxHashMap<ChannelId, usize>,
    targets: BTreeMap<AttachmentId, Arc<dyn MeasurementTarget>>,
    next_id: u64,
}

#[derive(Default)]
struct Counters {
    blocks: AtomicU64,
    tags: AtomicU64,
    filtered: AtomicU64,
    failures: AtomicU64,
}

/// Simulated time tagger with `max_channel` inputs.
pub struct InProcessBackend {
    max_channel: u32,
    registry: InstanceLock<Registry>,
    delivery: InstanceLock<()>,
    counters: Counters,
}

impl InProcessBackend {
    /// Backend accepting channels `1..=max_channel` and their falling edges.
    #[must_use]
    pub fn new(max_channel: u32) -> Self {
        Self {
            max_channel,
            registry: InstanceLock::new("backend.registry", Registry::default()),
            delivery: InstanceLock::new("backend.delivery", ()),
            counters: Counters::default(),
        }
    }

    /// Highest accepted channel number.
    #[must_use]
    pub const fn max_channel(&self) -> u32 {
        self.max_channel
    }

    /// Push `block` to every attached measurement.
    ///
    /// Returns the number of tags that survived channel filtering. A failing
    /// target is logged and skipped; the remaining targets still receive the
    /// block.
    pub fn deliver(&self, block: &TagBlock) -> Result<usize> {
        let delivery = self.delivery.lock()?;
        let (channels, targets) = {
            let registry = self.registry.lock()?;
            let channels: FxHashSet<ChannelId> = registry.channels.keys().copied().collect();
            let targets: Vec<_> = registry.targets.values().cloned().collect();
            (channels, targets)
        };

        let visible =
            block.filtered(|tag| !tag.kind.is_time_tag() || channels.contains(&tag.channel));
        let dropped = block.len() - visible.len();

        for target in &targets {
            if let Err(error) = target.deliver(&visible) {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    code = %error.code,
                    error = %error,
                    begin_time = block.begin_time(),
                    "measurement rejected block"
                );
            }
        }
        drop(delivery);

        self.counters.blocks.fetch_add(1, Ordering::Relaxed);
        self.counters
            .tags
            .fetch_add(visible.len() as u64, Ordering::Relaxed);
        self.counters
            .filtered
            .fetch_add(dropped as u64, Ordering::Relaxed);
        Ok(visible.len())
    }

    /// Delivery counters so far.
    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            blocks: self.counters.blocks.load(Ordering::Relaxed),
            tags: self.counters.tags.load(Ordering::Relaxed),
            filtered: self.counters.filtered.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Registration count of `channel`.
    pub fn registrations(&self, channel: ChannelId) -> usize {
        self.registry
            .lock_recovering()
            .channels
            .get(&channel)
            .copied()
            .unwrap_or(0)
    }

    /// Number of attached measurements.
    pub fn attached(&self) -> usize {
        self.registry.lock_recovering().targets.len()
    }

    fn validate_channel(&self, channel: ChannelId) -> Result<()> {
        let raw = channel.get();
        if raw == 0 || channel.is_unused() || raw.unsigned_abs() > self.max_channel {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("backend", "invalid_channel"),
                format!(
                    "channel {channel} is not an input of this backend (1..={})",
                    self.max_channel
                ),
            )
            .with_metadata("channel", channel.to_string())
            .with_metadata("max", self.max_channel.to_string()));
        }
        Ok(())
    }
}

impl TaggerBackend for InProcessBackend {
    fn is_unused_channel(&self, channel: ChannelId) -> bool {
        channel.is_unused()
    }

    fn register_channel(&self, channel: ChannelId) -> Result<()> {
        self.validate_channel(channel)?;
        *self.registry.lock()?.channels.entry(channel).or_insert(0) += 1;
        Ok(())
    }

    fn unregister_channel(&self, channel: ChannelId) {
        let mut registry = self.registry.lock_recovering();
        if let Some(count) = registry.channels.get_mut(&channel) {
            *count -= 1;
            if *count == 0 {
                registry.channels.remove(&channel);
            }
        }
    }

    fn attach(&self, target: Arc<dyn MeasurementTarget>) -> Result<AttachmentId> {
        let mut registry = self.registry.lock()?;
        registry.next_id += 1;
        let id = AttachmentId::new(registry.next_id);
        registry.targets.insert(id, target);
        drop(registry);
        tracing::debug!(attachment = %id, "target attached");
        Ok(id)
    }

    fn detach(&self, id: AttachmentId) {
        // Waits for an in-flight delivery so the target is never called after
        // detach returns.
        let delivery = self.delivery.lock_recovering();
        self.registry.lock_recovering().targets.remove(&id);
        drop(delivery);
        tracing::debug!(attachment = %id, "target detached");
    }
}
