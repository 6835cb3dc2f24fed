use std::{
    sync::{Condvar, Mutex, PoisonError},
    time::Duration,
};

/// A wake-up signal for state that lives outside of the lock.
///
/// Waiters re-check their condition under the signal's lock before
/// going to sleep and notifiers take the same lock after changing
/// state, so no wake-up gets lost in between.
#[derive(Debug, Default)]
pub struct Signal {
    lock: Mutex<()>,
    cvar: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes up every thread currently waiting on the signal.
    pub fn notify(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.cvar.notify_all();
    }

    /// Blocks until `ready` returns `true`.
    ///
    /// A non-zero `interval` bounds every individual sleep so that the
    /// condition is re-evaluated periodically even without notification.
    pub fn wait_until<F>(&self, interval: Duration, mut ready: F)
    where
        F: FnMut() -> bool,
    {
        while !ready() {
            let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            if ready() {
                break;
            }

            if interval.is_zero() {
                drop(self.cvar.wait(guard).unwrap_or_else(PoisonError::into_inner));
            } else {
                drop(
                    self.cvar
                        .wait_timeout(guard, interval)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
        }
    }

    /// Sleeps once for at most `interval` or until notified, unless
    /// `skip` already holds under the lock.
    ///
    /// Callers are expected to loop, as the sleep may end spuriously.
    pub fn park<F>(&self, interval: Duration, skip: F)
    where
        F: FnOnce() -> bool,
    {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if skip() {
            return;
        }

        if interval.is_zero() {
            drop(self.cvar.wait(guard).unwrap_or_else(PoisonError::into_inner));
        } else {
            drop(
                self.cvar
                    .wait_timeout(guard, interval)
                    .unwrap_or_else(PoisonError::into_inner),
            );
        }
    }
}
