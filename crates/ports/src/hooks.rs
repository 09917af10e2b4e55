//! Measurement callback contract.

use tagstream_domain::{TagEvent, Timestamp};

/// Callbacks a measurement implements; the lifecycle drives them.
///
/// # Locking
///
/// Every method runs while the owning measurement's instance lock is held.
/// Implementations must not try to reach the owning measurement again; the
/// `&mut self` receiver already grants exclusive access to all state.
pub trait MeasurementHooks: Send + 'static {
    /// The measurement is about to start processing.
    fn on_start(&mut self);

    /// The measurement stopped processing.
    fn on_stop(&mut self) {}

    /// Reset all accumulated data.
    fn on_clear(&mut self);

    /// Consume a run of tags in arrival order.
    ///
    /// `begin_time` and `end_time` bound the delivered block and are
    /// informational. Must not fail and must return quickly.
    fn process(&mut self, tags: &[TagEvent], begin_time: Timestamp, end_time: Timestamp);
}
