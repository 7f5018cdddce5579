use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

/// A waiter shared by every channel one `watch` call subscribes to.
///
/// The flag is owned by the mutex rather than an atomic so that `fire` and
/// the condvar wait cannot race between the flag check and the park.
pub(crate) struct Waiter {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl Waiter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            fired: Mutex::new(false),
            cond: Condvar::new(),
        })
    }

    pub(crate) fn fire(&self) {
        let mut fired = self.fired.lock();
        *fired = true;
        self.cond.notify_all();
    }

    /// Blocks until fired or the deadline passes. Returns the fired flag.
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> bool {
        let mut fired = self.fired.lock();
        loop {
            if *fired {
                return true;
            }
            match deadline {
                Some(at) => {
                    if self.cond.wait_until(&mut fired, at).timed_out() {
                        return *fired;
                    }
                }
                None => self.cond.wait(&mut fired),
            }
        }
    }
}

struct Shared {
    closed: AtomicBool,
    waiters: Mutex<SmallVec<[Arc<Waiter>; 2]>>,
}

/// Signal-once broadcast cell. Cloning yields another handle to the same
/// cell; channel identity is handle-shared, not per-clone.
#[derive(Clone)]
pub struct WatchChannel {
    shared: Arc<Shared>,
}

impl WatchChannel {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                closed: AtomicBool::new(false),
                waiters: Mutex::new(SmallVec::new()),
            }),
        }
    }

    /// Signals the channel. Idempotent; wakes every registered waiter.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let waiters = std::mem::take(&mut *self.shared.waiters.lock());
        for waiter in waiters {
            waiter.fire();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Two handles are the same channel when they share the cell.
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Registers `waiter`; returns false when the channel is already
    /// closed (the caller treats that as an immediate fire).
    pub(crate) fn subscribe(&self, waiter: &Arc<Waiter>) -> bool {
        let mut waiters = self.shared.waiters.lock();
        if self.shared.closed.load(Ordering::SeqCst) {
            return false;
        }
        waiters.push(Arc::clone(waiter));
        true
    }

    pub(crate) fn unsubscribe(&self, waiter: &Arc<Waiter>) {
        let mut waiters = self.shared.waiters.lock();
        waiters.retain(|w| !Arc::ptr_eq(w, waiter));
    }
}

impl Default for WatchChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WatchChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchChannel")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn close_is_idempotent() {
        let ch = WatchChannel::new();
        assert!(!ch.is_closed());
        ch.close();
        ch.close();
        assert!(ch.is_closed());
    }

    #[test]
    fn clones_share_the_cell() {
        let ch = WatchChannel::new();
        let other = ch.clone();
        assert!(ch.same_channel(&other));
        other.close();
        assert!(ch.is_closed());
    }

    #[test]
    fn distinct_channels_are_not_same() {
        assert!(!WatchChannel::new().same_channel(&WatchChannel::new()));
    }

    #[test]
    fn subscribe_after_close_reports_closed() {
        let ch = WatchChannel::new();
        ch.close();
        let waiter = Waiter::new();
        assert!(!ch.subscribe(&waiter));
    }

    #[test]
    fn close_fires_registered_waiter() {
        let ch = WatchChannel::new();
        let waiter = Waiter::new();
        assert!(ch.subscribe(&waiter));

        let ch2 = ch.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            ch2.close();
        });

        assert!(waiter.wait(Some(Instant::now() + Duration::from_secs(5))));
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_without_fire() {
        let ch = WatchChannel::new();
        let waiter = Waiter::new();
        assert!(ch.subscribe(&waiter));
        let fired = waiter.wait(Some(Instant::now() + Duration::from_millis(20)));
        assert!(!fired, "waiter must report not-fired on timeout");
        ch.unsubscribe(&waiter);
    }
}
