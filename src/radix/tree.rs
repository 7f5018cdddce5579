use std::sync::Arc;

use super::iter::{Iter, RevIter};
use super::node::{self, Node};
use super::txn::TreeTxn;
use crate::watch::WatchChannel;

/// Handle to one committed tree root. Cloning is an `Arc` clone; two
/// clones share every node. All reads run against the frozen root;
/// mutation goes through [`TreeTxn`].
pub struct Tree<V> {
    pub(crate) root: Arc<Node<V>>,
    pub(crate) size: usize,
}

impl<V: Clone> Tree<V> {
    pub fn new() -> Self {
        Self {
            root: Arc::new(Node::empty()),
            size: 0,
        }
    }

    /// Number of keys in the tree.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Opens a staging transaction over this root.
    pub fn txn(&self) -> TreeTxn<V> {
        TreeTxn::new(self)
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        node::get_leaf(&self.root, key).map(|leaf| &leaf.value)
    }

    /// Like `get`, additionally returning the watch channel for the key:
    /// the leaf's own channel on a hit, otherwise the channel of the
    /// deepest node on the search path.
    pub fn get_watch(&self, key: &[u8]) -> (WatchChannel, Option<&V>) {
        let (channel, leaf) = node::get_leaf_watch(&self.root, key);
        (channel, leaf.map(|l| &l.value))
    }

    /// Longest stored key that is a prefix of `key`, with its value.
    pub fn longest_prefix(&self, key: &[u8]) -> Option<(&[u8], &V)> {
        let mut last = None;
        let mut n = self.root.as_ref();
        let mut search = key;
        loop {
            if let Some(leaf) = &n.leaf {
                last = Some((leaf.key.as_slice(), &leaf.value));
            }
            if search.is_empty() {
                break;
            }
            let child = match n.get_edge(search[0]) {
                Some(child) => child,
                None => break,
            };
            let prefix = child.prefix.as_slice();
            if search.len() < prefix.len() || &search[..prefix.len()] != prefix {
                break;
            }
            search = &search[prefix.len()..];
            n = child;
        }
        last
    }

    /// Full scan in ascending key order.
    pub fn iter(&self) -> Iter<V> {
        Iter::full(&self.root)
    }

    /// Keys starting with `prefix`, ascending.
    pub fn iter_prefix(&self, prefix: &[u8]) -> Iter<V> {
        Iter::prefix(&self.root, prefix)
    }

    /// Keys >= `key`, ascending.
    pub fn iter_lower_bound(&self, key: &[u8]) -> Iter<V> {
        Iter::lower_bound(&self.root, key)
    }

    /// Full scan in descending key order.
    pub fn iter_rev(&self) -> RevIter<V> {
        RevIter::full(&self.root)
    }

    /// Keys starting with `prefix`, descending.
    pub fn iter_prefix_rev(&self, prefix: &[u8]) -> RevIter<V> {
        RevIter::prefix(&self.root, prefix)
    }

    /// Keys <= `key`, descending.
    pub fn iter_reverse_lower_bound(&self, key: &[u8]) -> RevIter<V> {
        RevIter::reverse_lower_bound(&self.root, key)
    }

    pub(crate) fn root(&self) -> &Arc<Node<V>> {
        &self.root
    }
}

impl<V: Clone> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Tree<V> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(keys: &[&[u8]]) -> Tree<u64> {
        let mut txn = Tree::new().txn();
        for (i, key) in keys.iter().enumerate() {
            txn.insert(key, i as u64);
        }
        txn.commit().0
    }

    #[test]
    fn get_on_empty_tree_returns_none() {
        let tree: Tree<u64> = Tree::new();
        assert!(tree.get(b"missing").is_none());
        assert!(tree.is_empty());
    }

    #[test]
    fn get_finds_exact_keys_only() {
        let tree = tree_of(&[b"app", b"apple", b"approach"]);
        assert_eq!(tree.get(b"app"), Some(&0));
        assert_eq!(tree.get(b"apple"), Some(&1));
        assert_eq!(tree.get(b"approach"), Some(&2));
        assert!(tree.get(b"ap").is_none());
        assert!(tree.get(b"apples").is_none());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn longest_prefix_returns_deepest_match() {
        let tree = tree_of(&[b"a", b"ab", b"abcd"]);
        let (key, value) = tree.longest_prefix(b"abcz").unwrap();
        assert_eq!(key, b"ab");
        assert_eq!(*value, 1);
        let (key, _) = tree.longest_prefix(b"abcd").unwrap();
        assert_eq!(key, b"abcd");
        assert!(tree.longest_prefix(b"zzz").is_none());
    }

    #[test]
    fn get_watch_returns_leaf_channel_on_hit() {
        let tree = tree_of(&[b"app", b"apple"]);
        let (channel, value) = tree.get_watch(b"apple");
        assert_eq!(value, Some(&1));
        assert!(!channel.is_closed());

        // A miss surfaces the deepest node's channel.
        let (channel, value) = tree.get_watch(b"apples");
        assert!(value.is_none());
        assert!(!channel.is_closed());
    }

    #[test]
    fn clones_share_structure() {
        let tree = tree_of(&[b"k1", b"k2"]);
        let clone = tree.clone();
        assert!(Arc::ptr_eq(tree.root(), clone.root()));
        assert_eq!(clone.len(), 2);
    }
}
