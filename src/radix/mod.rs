//! # Persistent Radix Tree
//!
//! The storage substrate for every index in the store: an immutable,
//! byte-keyed, compressed-prefix (radix) tree. A committed tree is never
//! mutated: every edit produces a new root that shares all unchanged
//! subtrees with its predecessor, so readers holding an old root see a
//! frozen structure for free.
//!
//! ## Structure
//!
//! Each node carries a compressed edge prefix, an optional leaf (the full
//! key and its value), and child edges sorted by their first label byte:
//!
//! ```text
//!                 (root)
//!                /      \
//!           "app"        "zoo" [leaf: zoo]
//!          /     \
//!    "le" [apple] "roach" [approach]
//! ```
//!
//! Keys are ordered lexicographically as unsigned bytes; a node's leaf
//! key is a proper prefix of every key below it, so a leaf always sorts
//! before its node's children.
//!
//! ## Watch channels
//!
//! Every node and every leaf owns a [`WatchChannel`](crate::watch::WatchChannel).
//! When a transaction copies a node on the write path, the old node's
//! channel is recorded for firing after the new root is published and the
//! copy gets a fresh channel. Watching a prefix therefore costs one
//! channel no matter how large the subtree is: any mutation below the
//! watched node replaces it, and the replacement fires its channel.
//!
//! ## Mutation
//!
//! [`TreeTxn`] is the only mutation path. It stages copy-on-write edits
//! against one root and yields the new [`Tree`] plus a [`Notifier`]
//! holding the channels to fire. A node is cloned at most once per
//! transaction: the transaction pins its snapshot root, so a node whose
//! `Arc` is uniquely held must have been created by this transaction and
//! is mutated in place.
//!
//! ## Iteration
//!
//! Iterators ([`Iter`], [`RevIter`]) hold `Arc`s into the tree and are
//! therefore stable snapshots themselves: writes staged after an iterator
//! was created copy around the pinned nodes rather than invalidating
//! them. Seek modes: full scan, prefix, lower bound (first key ≥ k), and
//! the reverse counterparts.

mod iter;
mod node;
mod tree;
mod txn;

pub(crate) use node::{get_leaf, get_leaf_watch, Node};
pub use iter::{Iter, RevIter};
pub use tree::Tree;
pub use txn::{Notifier, TreeTxn};
