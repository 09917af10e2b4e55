//! At most one outstanding start timestamp.

use tagstream_domain::Timestamp;

/// Holds the start of the interval currently open, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStartTracker {
    pending: Option<Timestamp>,
}

impl PendingStartTracker {
    /// Open an interval at `time`, returning an unconsumed earlier start.
    pub fn arm(&mut self, time: Timestamp) -> Option<Timestamp> {
        self.pending.replace(time)
    }

    /// Consume the open interval.
    pub fn take(&mut self) -> Option<Timestamp> {
        self.pending.take()
    }

    /// Forget any open interval; true when one was dropped.
    pub fn reset(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Start of the open interval.
    #[must_use]
    pub const fn peek(&self) -> Option<Timestamp> {
        self.pending
    }
}
