//! Start/click channel assignment for a start-stop measurement.

use crate::primitives::{ChannelId, PrimitiveError};
use serde::{Deserialize, Serialize};

/// Resolved channel roles.
///
/// `click` closes an interval and `start` opens one. When the requested
/// start channel is unused, `start == click` and every click both closes the
/// running interval and opens the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRoles {
    click: ChannelId,
    start: ChannelId,
}

impl ChannelRoles {
    /// Resolve roles against the backend's notion of an unused channel.
    pub fn resolve(
        click: ChannelId,
        start: ChannelId,
        is_unused: impl Fn(ChannelId) -> bool,
    ) -> Result<Self, PrimitiveError> {
        if is_unused(click) {
            return Err(PrimitiveError::UnusedClickChannel { channel: click });
        }
        let start = if is_unused(start) { click } else { start };
        Ok(Self { click, start })
    }

    /// Channel that closes an interval.
    #[must_use]
    pub const fn click(&self) -> ChannelId {
        self.click
    }

    /// Channel that opens an interval.
    #[must_use]
    pub const fn start(&self) -> ChannelId {
        self.start
    }

    /// True when one channel plays both roles.
    #[must_use]
    pub fn is_self_referential(&self) -> bool {
        self.click == self.start
    }

    /// Distinct channels to register with the backend.
    #[must_use]
    pub fn distinct(&self) -> Vec<ChannelId> {
        if self.is_self_referential() {
            vec![self.click]
        } else {
            vec![self.click, self.start]
        }
    }
}
