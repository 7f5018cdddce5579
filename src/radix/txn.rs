//! Copy-on-write staging over one tree root.
//!
//! The transaction owns a private working root. Every mutation clones the
//! nodes on its path exactly once: a node whose `Arc` is still shared
//! belongs to the snapshot (or to a live iterator) and is copied with a
//! fresh watch channel, recording the old channel for post-publish
//! firing; a uniquely-held node was created by this transaction and is
//! mutated in place. The snapshot root is pinned for the transaction's
//! lifetime, which is what makes unique ownership a valid proof of
//! "created here".

use std::mem;
use std::sync::Arc;

use super::node::{self, Edge, Leaf, Node};
use super::tree::Tree;
use crate::watch::WatchChannel;

/// The channels recorded by a committed transaction. Firing is separated
/// from [`TreeTxn::commit`] so a caller can publish the new root first
/// and notify watchers after.
#[must_use = "watchers only wake when notify() is called"]
pub struct Notifier {
    channels: Vec<WatchChannel>,
}

impl Notifier {
    /// Closes every recorded channel. Channels may appear more than once;
    /// closing is idempotent.
    pub fn notify(self) {
        for channel in self.channels {
            channel.close();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// A mutable staging layer over one [`Tree`] root.
pub struct TreeTxn<V> {
    root: Arc<Node<V>>,
    /// Pins the pre-transaction root so every committed node stays
    /// multiply-referenced while the transaction lives.
    snapshot: Arc<Node<V>>,
    /// Scratch node for taking ownership of edge slots.
    vacant: Arc<Node<V>>,
    size: usize,
    track: Vec<WatchChannel>,
}

impl<V: Clone> TreeTxn<V> {
    pub(crate) fn new(tree: &Tree<V>) -> Self {
        Self {
            root: Arc::clone(tree.root()),
            snapshot: Arc::clone(tree.root()),
            vacant: Arc::new(Node::empty()),
            size: tree.len(),
            track: Vec::new(),
        }
    }

    /// Number of keys in the working tree.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The current working root, for reads and iteration inside a write
    /// transaction. Holding the returned `Arc` pins the view: later
    /// mutations in this transaction copy around it.
    pub(crate) fn root(&self) -> Arc<Node<V>> {
        Arc::clone(&self.root)
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        node::get_leaf(&self.root, key).map(|leaf| &leaf.value)
    }

    /// Inserts `key`, returning the value it replaced.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let root = mem::replace(&mut self.root, Arc::clone(&self.vacant));
        let (root, replaced) = self.insert_rec(root, key, key, value);
        self.root = root;
        if replaced.is_none() {
            self.size += 1;
        }
        replaced
    }

    /// Removes `key`, returning its value. Removing an absent key is a
    /// no-op that records no channels.
    pub fn delete(&mut self, key: &[u8]) -> Option<V> {
        // Probe first so a miss touches nothing.
        node::get_leaf(&self.root, key)?;
        let root = mem::replace(&mut self.root, Arc::clone(&self.vacant));
        let (root, removed) = self.delete_rec(root, key, true);
        self.root = root;
        debug_assert!(removed.is_some());
        if removed.is_some() {
            self.size -= 1;
        }
        removed.map(|leaf| leaf.value)
    }

    /// Removes every key starting with `prefix`, returning how many were
    /// removed. The channels of every node and leaf inside the removed
    /// subtree are recorded, in addition to the path above it.
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        if !subtree_exists(&self.root, prefix) {
            return 0;
        }
        let root = mem::replace(&mut self.root, Arc::clone(&self.vacant));
        let (root, removed) = self.delete_prefix_rec(root, prefix, true);
        self.root = root;
        self.size -= removed;
        removed
    }

    /// Seals the transaction: the new tree plus the channels to fire.
    pub fn commit(self) -> (Tree<V>, Notifier) {
        (
            Tree {
                root: self.root,
                size: self.size,
            },
            Notifier {
                channels: self.track,
            },
        )
    }

    /// Takes ownership of a node for mutation. A shared node is cloned
    /// with a fresh channel and its old channel is recorded; a uniquely
    /// held node was created by this transaction and passes through.
    fn modify(&mut self, n: Arc<Node<V>>) -> Node<V> {
        match Arc::try_unwrap(n) {
            Ok(node) => node,
            Err(shared) => {
                self.track.push(shared.channel.clone());
                Node {
                    channel: WatchChannel::new(),
                    prefix: shared.prefix.clone(),
                    leaf: shared.leaf.clone(),
                    edges: shared.edges.clone(),
                }
            }
        }
    }

    fn insert_rec(
        &mut self,
        n: Arc<Node<V>>,
        key: &[u8],
        search: &[u8],
        value: V,
    ) -> (Arc<Node<V>>, Option<V>) {
        if search.is_empty() {
            let mut nc = self.modify(n);
            let replaced = match nc.leaf.take() {
                Some(old) => {
                    self.track.push(old.channel.clone());
                    Some(old.value)
                }
                None => None,
            };
            nc.leaf = Some(Leaf::new(key, value));
            return (Arc::new(nc), replaced);
        }

        let label = search[0];
        let mut nc = self.modify(n);
        let idx = match nc.edge_index(label) {
            Ok(idx) => idx,
            Err(_) => {
                // No edge: attach a fresh leaf node for the whole rest.
                let mut child = Node::empty();
                child.prefix = search.to_vec();
                child.leaf = Some(Leaf::new(key, value));
                nc.add_edge(Edge {
                    label,
                    node: Arc::new(child),
                });
                return (Arc::new(nc), None);
            }
        };

        let child = mem::replace(&mut nc.edges[idx].node, Arc::clone(&self.vacant));
        let common = node::longest_common(search, &child.prefix);

        if common == child.prefix.len() {
            // Full edge match: descend.
            let (child, replaced) = self.insert_rec(child, key, &search[common..], value);
            nc.edges[idx].node = child;
            return (Arc::new(nc), replaced);
        }

        // Diverged mid-edge: split the edge at the common prefix.
        let mut split = Node::empty();
        split.prefix = search[..common].to_vec();

        let mut trimmed = self.modify(child);
        let trimmed_label = trimmed.prefix[common];
        trimmed.prefix = trimmed.prefix[common..].to_vec();
        split.add_edge(Edge {
            label: trimmed_label,
            node: Arc::new(trimmed),
        });

        let rest = &search[common..];
        if rest.is_empty() {
            split.leaf = Some(Leaf::new(key, value));
        } else {
            let mut tail = Node::empty();
            tail.prefix = rest.to_vec();
            tail.leaf = Some(Leaf::new(key, value));
            split.add_edge(Edge {
                label: rest[0],
                node: Arc::new(tail),
            });
        }

        nc.edges[idx].node = Arc::new(split);
        (Arc::new(nc), None)
    }

    fn delete_rec(
        &mut self,
        n: Arc<Node<V>>,
        search: &[u8],
        is_root: bool,
    ) -> (Arc<Node<V>>, Option<Leaf<V>>) {
        if search.is_empty() {
            let mut nc = self.modify(n);
            let removed = nc.leaf.take();
            if let Some(leaf) = &removed {
                self.track.push(leaf.channel.clone());
            }
            if !is_root && nc.edges.len() == 1 {
                self.merge_child(&mut nc);
            }
            return (Arc::new(nc), removed);
        }

        let mut nc = self.modify(n);
        // The probe in delete() guarantees the path exists.
        let idx = match nc.edge_index(search[0]) {
            Ok(idx) => idx,
            Err(_) => return (Arc::new(nc), None),
        };
        let child = mem::replace(&mut nc.edges[idx].node, Arc::clone(&self.vacant));
        let consumed = child.prefix.len();
        let (child, removed) = self.delete_rec(child, &search[consumed..], false);

        if child.leaf.is_none() && child.edges.is_empty() {
            nc.edges.remove(idx);
            if !is_root && nc.edges.len() == 1 && nc.leaf.is_none() {
                self.merge_child(&mut nc);
            }
        } else {
            nc.edges[idx].node = child;
        }
        (Arc::new(nc), removed)
    }

    fn delete_prefix_rec(
        &mut self,
        n: Arc<Node<V>>,
        search: &[u8],
        is_root: bool,
    ) -> (Arc<Node<V>>, usize) {
        if search.is_empty() {
            // The whole subtree goes: record every channel inside it.
            let count = self.track_subtree(&n);
            let mut nc = self.modify(n);
            nc.leaf = None;
            nc.edges.clear();
            return (Arc::new(nc), count);
        }

        let mut nc = self.modify(n);
        let idx = match nc.edge_index(search[0]) {
            Ok(idx) => idx,
            Err(_) => return (Arc::new(nc), 0),
        };
        let child = mem::replace(&mut nc.edges[idx].node, Arc::clone(&self.vacant));
        // The prefix may end mid-edge; the whole child subtree matches then.
        let shared = node::longest_common(search, &child.prefix);
        if shared < child.prefix.len() && shared < search.len() {
            nc.edges[idx].node = child;
            return (Arc::new(nc), 0);
        }
        let consumed = child.prefix.len().min(search.len());
        let (child, count) = self.delete_prefix_rec(child, &search[consumed..], false);

        if child.leaf.is_none() && child.edges.is_empty() {
            nc.edges.remove(idx);
            if !is_root && nc.edges.len() == 1 && nc.leaf.is_none() {
                self.merge_child(&mut nc);
            }
        } else {
            nc.edges[idx].node = child;
        }
        (Arc::new(nc), count)
    }

    /// Collapses a leafless single-child node into its child, recording
    /// the child's channel (the child node disappears as a structural
    /// entity even though its content survives).
    fn merge_child(&mut self, n: &mut Node<V>) {
        let edge = n.edges.remove(0);
        let child = edge.node.as_ref();
        self.track.push(child.channel.clone());
        n.prefix.extend_from_slice(&child.prefix);
        n.leaf = child.leaf.clone();
        n.edges = child.edges.clone();
    }

    fn track_subtree(&mut self, n: &Node<V>) -> usize {
        self.track.push(n.channel.clone());
        let mut count = 0;
        if let Some(leaf) = &n.leaf {
            self.track.push(leaf.channel.clone());
            count += 1;
        }
        for edge in &n.edges {
            count += self.track_subtree(&edge.node);
        }
        count
    }
}

/// Does any stored key start with `prefix`? The match may end mid-edge.
fn subtree_exists<V>(root: &Node<V>, prefix: &[u8]) -> bool {
    let mut n = root;
    let mut search = prefix;
    loop {
        if search.is_empty() {
            return n.leaf.is_some() || !n.edges.is_empty();
        }
        let child = match n.get_edge(search[0]) {
            Some(child) => child,
            None => return false,
        };
        let shared = node::longest_common(search, &child.prefix);
        if shared == search.len() {
            return true;
        }
        if shared < child.prefix.len() {
            return false;
        }
        search = &search[shared..];
        n = child;
    }
}
