use std::time::{Duration, Instant};

use smallvec::SmallVec;

use super::channel::{Waiter, WatchChannel};

/// Explicit cancellation for [`WatchSet::watch`], with an optional
/// deadline attached at construction. Cloned tokens share the cancel
/// signal.
#[derive(Clone, Debug)]
pub struct CancelToken {
    signal: WatchChannel,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            signal: WatchChannel::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            signal: WatchChannel::new(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Cancels every in-flight and future `watch` using this token.
    pub fn cancel(&self) {
        self.signal.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_closed()
    }

    pub(crate) fn signal(&self) -> &WatchChannel {
        &self.signal
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A caller-owned bag of watch channels, awaited as a disjunction.
///
/// Channels are deduplicated by identity, so adding the same scan scope
/// twice costs one slot.
#[derive(Default)]
pub struct WatchSet {
    channels: SmallVec<[WatchChannel; 8]>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: WatchChannel) {
        if !self.channels.iter().any(|c| c.same_channel(&channel)) {
            self.channels.push(channel);
        }
    }

    /// Adds `channel` unless the set already holds `limit` channels, in
    /// which case `alt` (a channel for a broader scope, conventionally
    /// the root of the involved tree) is added instead and the set stops
    /// growing.
    pub fn add_with_limit(&mut self, limit: usize, channel: WatchChannel, alt: WatchChannel) {
        if self.channels.len() < limit {
            self.add(channel);
        } else {
            self.add(alt);
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Blocks until any channel in the set fires (`true`), or the token is
    /// cancelled or its deadline passes (`false`). An empty set can only
    /// return through the token.
    pub fn watch(&self, cancel: &CancelToken) -> bool {
        self.watch_until(Some(cancel.signal()), cancel.deadline())
    }

    /// Blocks until any channel fires (`true`) or `timeout` elapses
    /// (`false`).
    pub fn watch_timeout(&self, timeout: Duration) -> bool {
        self.watch_until(None, Some(Instant::now() + timeout))
    }

    fn watch_until(&self, cancel: Option<&WatchChannel>, deadline: Option<Instant>) -> bool {
        // Fast path: a channel fired before we ever parked.
        if self.channels.iter().any(|c| c.is_closed()) {
            return true;
        }

        let waiter = Waiter::new();
        let mut subscribed: SmallVec<[&WatchChannel; 8]> = SmallVec::new();
        let mut triggered = false;
        for channel in &self.channels {
            if channel.subscribe(&waiter) {
                subscribed.push(channel);
            } else {
                triggered = true;
                break;
            }
        }

        let mut cancel_subscribed = false;
        if !triggered {
            if let Some(signal) = cancel {
                if signal.subscribe(&waiter) {
                    cancel_subscribed = true;
                } else {
                    // Already cancelled; fall through to cleanup.
                    triggered = self.channels.iter().any(|c| c.is_closed());
                }
            }
            if !triggered && (cancel.is_none() || cancel_subscribed) {
                waiter.wait(deadline);
                triggered = self.channels.iter().any(|c| c.is_closed());
            }
        }

        for channel in subscribed {
            channel.unsubscribe(&waiter);
        }
        if cancel_subscribed {
            if let Some(signal) = cancel {
                signal.unsubscribe(&waiter);
            }
        }
        triggered
    }
}

impl std::fmt::Debug for WatchSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSet")
            .field("channels", &self.channels.len())
            .finish()
    }
}
