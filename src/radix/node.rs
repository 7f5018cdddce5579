use std::sync::Arc;

use smallvec::SmallVec;

use crate::watch::WatchChannel;

/// Child edges kept inline up to this count. Index trees over encoded
/// keys fan out narrowly near the leaves, so most nodes stay inline.
const INLINE_EDGES: usize = 4;

/// A stored key/value pair. Leaves keep their own watch channel so an
/// exact-match watch fires only when that key's value changes, not when a
/// longer key is added under the same node.
pub(crate) struct Leaf<V> {
    pub(crate) channel: WatchChannel,
    pub(crate) key: Vec<u8>,
    pub(crate) value: V,
}

impl<V> Leaf<V> {
    pub(crate) fn new(key: &[u8], value: V) -> Self {
        Self {
            channel: WatchChannel::new(),
            key: key.to_vec(),
            value,
        }
    }
}

impl<V: Clone> Clone for Leaf<V> {
    fn clone(&self) -> Self {
        // A structural share: the clone is the same logical leaf, so it
        // keeps the same channel.
        Self {
            channel: self.channel.clone(),
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Edge<V> {
    pub(crate) label: u8,
    pub(crate) node: Arc<Node<V>>,
}

/// One tree node. Immutable once reachable from a committed root.
pub(crate) struct Node<V> {
    pub(crate) channel: WatchChannel,
    pub(crate) prefix: Vec<u8>,
    pub(crate) leaf: Option<Leaf<V>>,
    pub(crate) edges: SmallVec<[Edge<V>; INLINE_EDGES]>,
}

impl<V> Node<V> {
    pub(crate) fn empty() -> Self {
        Self {
            channel: WatchChannel::new(),
            prefix: Vec::new(),
            leaf: None,
            edges: SmallVec::new(),
        }
    }

    /// Binary search over the sorted edge labels.
    pub(crate) fn edge_index(&self, label: u8) -> Result<usize, usize> {
        self.edges.binary_search_by_key(&label, |e| e.label)
    }

    pub(crate) fn get_edge(&self, label: u8) -> Option<&Arc<Node<V>>> {
        self.edge_index(label).ok().map(|i| &self.edges[i].node)
    }

    /// Index of the first edge whose label is >= `label`.
    pub(crate) fn lower_bound_edge(&self, label: u8) -> usize {
        self.edges.partition_point(|e| e.label < label)
    }

    /// Inserts keeping edges sorted. The label must not be present.
    pub(crate) fn add_edge(&mut self, edge: Edge<V>) {
        let at = self.lower_bound_edge(edge.label);
        debug_assert!(self.edges.get(at).map_or(true, |e| e.label != edge.label));
        self.edges.insert(at, edge);
    }

    /// Smallest leaf in this subtree.
    pub(crate) fn minimum(&self) -> Option<&Leaf<V>> {
        let mut n = self;
        loop {
            if let Some(leaf) = &n.leaf {
                return Some(leaf);
            }
            match n.edges.first() {
                Some(edge) => n = &edge.node,
                None => return None,
            }
        }
    }

    /// Largest leaf in this subtree.
    pub(crate) fn maximum(&self) -> Option<&Leaf<V>> {
        let mut n = self;
        loop {
            match n.edges.last() {
                Some(edge) => n = &edge.node,
                None => return n.leaf.as_ref(),
            }
        }
    }
}

/// Walks `root` for `key`, returning the leaf on an exact match.
pub(crate) fn get_leaf<'a, V>(root: &'a Node<V>, key: &[u8]) -> Option<&'a Leaf<V>> {
    let mut n = root;
    let mut search = key;
    loop {
        if search.is_empty() {
            return n.leaf.as_ref();
        }
        let child = n.get_edge(search[0])?;
        let prefix = child.prefix.as_slice();
        if search.len() < prefix.len() || &search[..prefix.len()] != prefix {
            return None;
        }
        search = &search[prefix.len()..];
        n = child;
    }
}

/// Like [`get_leaf`], additionally returning the watch channel for the
/// key: the leaf's own channel on a hit, otherwise the channel of the
/// deepest node on the search path.
pub(crate) fn get_leaf_watch<'a, V>(
    root: &'a Node<V>,
    key: &[u8],
) -> (WatchChannel, Option<&'a Leaf<V>>) {
    let mut n = root;
    let mut search = key;
    loop {
        if search.is_empty() {
            return match &n.leaf {
                Some(leaf) => (leaf.channel.clone(), Some(leaf)),
                None => (n.channel.clone(), None),
            };
        }
        let child = match n.get_edge(search[0]) {
            Some(child) => child,
            None => return (n.channel.clone(), None),
        };
        let prefix = child.prefix.as_slice();
        if search.len() < prefix.len() || &search[..prefix.len()] != prefix {
            return (child.channel.clone(), None);
        }
        search = &search[prefix.len()..];
        n = child;
    }
}

/// Length of the shared prefix of `a` and `b`.
pub(crate) fn longest_common(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
