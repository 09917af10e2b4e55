//! Tagger backend boundary contract.
//!
//! A backend owns the physical (or simulated) input channels and pushes tag
//! blocks into every attached measurement. Measurements only see this trait.

use std::fmt;
use std::sync::Arc;
use tagstream_domain::{ChannelId, TagBlock};
use tagstream_shared::Result;

/// Handle identifying one attached measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentId(u64);

impl AttachmentId {
    /// Wrap a backend-assigned id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "attachment-{}", self.0)
    }
}

/// Receiver side of block delivery.
///
/// Implementations serialize delivery against their own readers; a backend
/// never delivers to the same target from two threads at once.
pub trait MeasurementTarget: Send + Sync {
    /// Consume one block. Errors are reported to the backend, never panicked.
    fn deliver(&self, block: &TagBlock) -> Result<()>;
}

/// Boundary contract for a time tagger.
pub trait TaggerBackend: Send + Sync {
    /// True when `channel` denotes "no channel" on this backend.
    fn is_unused_channel(&self, channel: ChannelId) -> bool;

    /// Request tags from `channel`. Registering twice is allowed; each call
    /// must be balanced by [`Self::unregister_channel`].
    fn register_channel(&self, channel: ChannelId) -> Result<()>;

    /// Release one registration of `channel`.
    fn unregister_channel(&self, channel: ChannelId);

    /// Finish construction of a measurement: from now on `target` receives
    /// blocks.
    fn attach(&self, target: Arc<dyn MeasurementTarget>) -> Result<AttachmentId>;

    /// Stop delivering to a previously attached target.
    fn detach(&self, id: AttachmentId);
}
