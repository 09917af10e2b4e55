//! Per-instance exclusive lock with a change notification.
//!
//! Every measurement owns one `InstanceLock`. It serializes tag processing,
//! snapshot reads and lifecycle transitions. A poisoned mutex means a holder
//! panicked mid-update, which is reported as an invariant error instead of
//! being propagated as a panic.

use crate::errors::{ErrorCode, ErrorEnvelope, Result};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Error code for a lock whose previous holder panicked.
pub fn lock_poisoned_code() -> ErrorCode {
    ErrorCode::new("measurement", "lock_poisoned")
}

/// Mutex + condvar pair guarding one instance's mutable state.
#[derive(Debug)]
pub struct InstanceLock<T> {
    name: &'static str,
    state: Mutex<T>,
    changed: Condvar,
}

impl<T> InstanceLock<T> {
    /// Wrap `value` under a lock labelled `name` for diagnostics.
    pub const fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            state: Mutex::new(value),
            changed: Condvar::new(),
        }
    }

    /// Diagnostic label of this lock.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Acquire the lock, failing if a previous holder panicked.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>> {
        self.state.lock().map_err(|_| self.poisoned())
    }

    /// Acquire the lock even if it is poisoned.
    ///
    /// Only teardown uses this: it must force the final transition regardless
    /// of what a panicking holder left behind.
    pub fn lock_recovering(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every waiter blocked in [`Self::wait_while`].
    pub fn notify_all(&self) {
        self.changed.notify_all();
    }

    /// Block while `condition` holds, up to `timeout`.
    ///
    /// Returns the reacquired guard and `true` when the condition cleared
    /// before the timeout.
    pub fn wait_while<'a, F>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
        condition: F,
    ) -> Result<(MutexGuard<'a, T>, bool)>
    where
        F: FnMut(&mut T) -> bool,
    {
        let (guard, wait) = self
            .changed
            .wait_timeout_while(guard, timeout, condition)
            .map_err(|_| self.poisoned())?;
        Ok((guard, !wait.timed_out()))
    }

    fn poisoned(&self) -> ErrorEnvelope {
        tracing::error!(lock = self.name, "instance lock poisoned");
        ErrorEnvelope::invariant(
            lock_poisoned_code(),
            "a previous holder of the instance lock panicked",
        )
        .with_metadata("lock", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn poison(lock: &Arc<InstanceLock<u32>>) {
        let shared = Arc::clone(lock);
        let outcome = thread::spawn(move || {
            let _guard = shared.lock();
            std::panic::resume_unwind(Box::new("holder failed"));
        })
        .join();
        assert!(outcome.is_err());
    }

    #[test]
    fn lock_guards_mutation() -> Result<()> {
        let lock = InstanceLock::new("counter", 0_u32);
        *lock.lock()? += 3;
        assert_eq!(*lock.lock()?, 3);
        assert_eq!(lock.name(), "counter");
        Ok(())
    }

    #[test]
    fn poisoned_lock_reports_invariant_error() {
        let lock = Arc::new(InstanceLock::new("poisoned", 7_u32));
        poison(&lock);

        let error = lock.lock().err();
        assert!(error.as_ref().is_some_and(ErrorEnvelope::is_invariant));
        assert_eq!(error.map(|error| error.code), Some(lock_poisoned_code()));
        assert_eq!(*lock.lock_recovering(), 7);
    }

    #[test]
    fn wait_while_wakes_on_notify() -> Result<()> {
        let lock = Arc::new(InstanceLock::new("flag", false));
        let setter = Arc::clone(&lock);
        let handle = thread::spawn(move || -> Result<()> {
            *setter.lock()? = true;
            setter.notify_all();
            Ok(())
        });

        let guard = lock.lock()?;
        let (guard, cleared) = lock.wait_while(guard, Duration::from_secs(5), |flag| !*flag)?;
        assert!(cleared);
        assert!(*guard);
        drop(guard);
        assert!(handle.join().is_ok_and(|result| result.is_ok()));
        Ok(())
    }

    #[test]
    fn wait_while_times_out() -> Result<()> {
        let lock = InstanceLock::new("idle", 0_u8);
        let guard = lock.lock()?;
        let (_guard, cleared) = lock.wait_while(guard, Duration::from_millis(10), |_| true)?;
        assert!(!cleared);
        Ok(())
    }
}
