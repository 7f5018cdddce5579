//! # Watch Channels
//!
//! Change notification for query scopes. Every radix-tree node (and leaf)
//! carries a [`WatchChannel`]: a signal-once broadcast cell that is closed
//! exactly when the node it belongs to, or any descendant of it, is replaced by
//! a committed mutation. The copy that replaces a node carries a fresh,
//! unsignalled channel, so a channel obtained from one committed state
//! speaks only about changes relative to that state.
//!
//! ## Contract
//!
//! - `close()` is idempotent. Once closed, every current waiter wakes and
//!   every future wait returns immediately.
//! - A fire means "something under this scope may have changed". Spurious
//!   fires are permitted; missed fires are not.
//!
//! ## Waiting on many channels
//!
//! Callers collect the channels returned by queries into a [`WatchSet`] and
//! block on the disjunction:
//!
//! ```text
//! query ──▶ channel ──┐
//! query ──▶ channel ──┼──▶ WatchSet::watch(&cancel) ──▶ triggered?
//! query ──▶ channel ──┘
//! ```
//!
//! One waiter (a mutex/condvar pair) is registered with every channel in
//! the set for the duration of the call and removed on the way out, whether
//! the wait fired, timed out, or was cancelled. No dangling subscriptions.
//!
//! [`WatchSet::add_with_limit`] bounds the set size: past the limit it
//! substitutes a single broader-scope channel (conventionally the root of
//! the involved tree, as returned by a no-argument `get_watch` scan).
//!
//! ## Cancellation
//!
//! [`CancelToken`] carries an explicit `cancel()` signal and an optional
//! deadline. `watch` returns `false` promptly on either.

mod channel;
mod set;

pub use channel::WatchChannel;
pub use set::{CancelToken, WatchSet};
