//! Tree walkers. Frames hold `Arc`s into the tree, so an iterator is a
//! stable snapshot of the root it was created from: transaction writes
//! staged after creation copy around the pinned nodes.

use std::cmp::Ordering;
use std::sync::Arc;

use super::node::Node;
use crate::watch::WatchChannel;

struct Frame<V> {
    node: Arc<Node<V>>,
    next_edge: usize,
    leaf_pending: bool,
}

impl<V> Frame<V> {
    fn explore(node: Arc<Node<V>>) -> Self {
        Self {
            node,
            next_edge: 0,
            leaf_pending: true,
        }
    }
}

/// Ascending-order walker.
pub struct Iter<V> {
    stack: Vec<Frame<V>>,
    watch: WatchChannel,
}

/// Compares a node's prefix against the same-length portion of `search`.
/// Equal with `prefix.len() >= search.len()` implies exact equality.
fn prefix_cmp(prefix: &[u8], search: &[u8]) -> Ordering {
    if prefix.len() < search.len() {
        prefix.cmp(&search[..prefix.len()])
    } else {
        prefix.cmp(search)
    }
}

impl<V: Clone> Iter<V> {
    pub(crate) fn full(root: &Arc<Node<V>>) -> Self {
        Self {
            stack: vec![Frame::explore(Arc::clone(root))],
            watch: root.channel.clone(),
        }
    }

    /// Seeks to the subtree of keys starting with `prefix`. The watch
    /// channel is that of the deepest node reached on the prefix path,
    /// whether or not anything matched.
    pub(crate) fn prefix(root: &Arc<Node<V>>, prefix: &[u8]) -> Self {
        let (frame, watch) = seek_prefix(root, prefix);
        Self {
            stack: frame.into_iter().map(Frame::explore).collect(),
            watch,
        }
    }

    /// Seeks to the first key >= `key`.
    pub(crate) fn lower_bound(root: &Arc<Node<V>>, key: &[u8]) -> Self {
        let watch = root.channel.clone();
        let mut stack = Vec::new();
        let mut n = Arc::clone(root);
        let mut search = key;
        loop {
            match prefix_cmp(&n.prefix, search) {
                // This whole subtree sorts above the bound.
                Ordering::Greater => {
                    stack.push(Frame::explore(n));
                    break;
                }
                // This whole subtree sorts below the bound.
                Ordering::Less => break,
                Ordering::Equal => {}
            }
            if n.prefix.len() >= search.len() {
                // Exact match: the node's leaf and everything below it
                // are >= the bound.
                stack.push(Frame::explore(n));
                break;
            }
            search = &search[n.prefix.len()..];
            let idx = n.lower_bound_edge(search[0]);
            if idx + 1 < n.edges.len() {
                // Strictly-higher siblings are all above the bound; keep
                // them below the deeper frames on the stack.
                stack.push(Frame {
                    node: Arc::clone(&n),
                    next_edge: idx + 1,
                    leaf_pending: false,
                });
            }
            if idx == n.edges.len() {
                break;
            }
            let child = Arc::clone(&n.edges[idx].node);
            n = child;
        }
        Self { stack, watch }
    }

    /// The scan-scope watch channel this iterator was seeded with.
    pub fn watch(&self) -> &WatchChannel {
        &self.watch
    }
}

impl<V: Clone> Iterator for Iter<V> {
    type Item = (Vec<u8>, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let push = {
                let frame = self.stack.last_mut()?;
                if frame.leaf_pending {
                    frame.leaf_pending = false;
                    if let Some(leaf) = &frame.node.leaf {
                        return Some((leaf.key.clone(), leaf.value.clone()));
                    }
                }
                if frame.next_edge < frame.node.edges.len() {
                    let child = Arc::clone(&frame.node.edges[frame.next_edge].node);
                    frame.next_edge += 1;
                    Some(child)
                } else {
                    None
                }
            };
            match push {
                Some(child) => self.stack.push(Frame::explore(child)),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

struct RevFrame<V> {
    node: Arc<Node<V>>,
    /// Edges `..next_edge` remain to be expanded, highest first.
    next_edge: usize,
    leaf_pending: bool,
}

impl<V> RevFrame<V> {
    fn explore(node: Arc<Node<V>>) -> Self {
        let next_edge = node.edges.len();
        Self {
            node,
            next_edge,
            leaf_pending: true,
        }
    }
}

/// Descending-order walker. A node's leaf is emitted after its children:
/// the leaf key is a proper prefix of everything below the node, so it is
/// the smallest key in the subtree.
pub struct RevIter<V> {
    stack: Vec<RevFrame<V>>,
    watch: WatchChannel,
}

impl<V: Clone> RevIter<V> {
    pub(crate) fn full(root: &Arc<Node<V>>) -> Self {
        Self {
            stack: vec![RevFrame::explore(Arc::clone(root))],
            watch: root.channel.clone(),
        }
    }

    pub(crate) fn prefix(root: &Arc<Node<V>>, prefix: &[u8]) -> Self {
        let (frame, watch) = seek_prefix(root, prefix);
        Self {
            stack: frame.into_iter().map(RevFrame::explore).collect(),
            watch,
        }
    }

    /// Seeks so iteration yields keys <= `key`, largest first.
    pub(crate) fn reverse_lower_bound(root: &Arc<Node<V>>, key: &[u8]) -> Self {
        let watch = root.channel.clone();
        let mut stack = Vec::new();
        let mut n = Arc::clone(root);
        let mut search = key;
        loop {
            match prefix_cmp(&n.prefix, search) {
                // Everything under this node sorts below the bound.
                Ordering::Less => {
                    stack.push(RevFrame::explore(n));
                    break;
                }
                // Everything under this node sorts above the bound.
                Ordering::Greater => break,
                Ordering::Equal => {}
            }
            if n.prefix.len() >= search.len() {
                // Exact match: the leaf qualifies, children are longer
                // keys and do not.
                if n.leaf.is_some() {
                    stack.push(RevFrame {
                        node: n,
                        next_edge: 0,
                        leaf_pending: true,
                    });
                }
                break;
            }
            search = &search[n.prefix.len()..];
            let idx = n.lower_bound_edge(search[0]);
            // Lower siblings sort below the bound in full, as does this
            // node's own leaf (a proper prefix of the bound).
            if idx > 0 || n.leaf.is_some() {
                stack.push(RevFrame {
                    node: Arc::clone(&n),
                    next_edge: idx,
                    leaf_pending: n.leaf.is_some(),
                });
            }
            if idx < n.edges.len() && n.edges[idx].label == search[0] {
                let child = Arc::clone(&n.edges[idx].node);
                n = child;
            } else {
                break;
            }
        }
        Self { stack, watch }
    }

    pub fn watch(&self) -> &WatchChannel {
        &self.watch
    }
}

impl<V: Clone> Iterator for RevIter<V> {
    type Item = (Vec<u8>, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let push = {
                let frame = self.stack.last_mut()?;
                if frame.next_edge > 0 {
                    frame.next_edge -= 1;
                    Some(Arc::clone(&frame.node.edges[frame.next_edge].node))
                } else {
                    if frame.leaf_pending {
                        frame.leaf_pending = false;
                        if let Some(leaf) = &frame.node.leaf {
                            return Some((leaf.key.clone(), leaf.value.clone()));
                        }
                    }
                    None
                }
            };
            match push {
                Some(child) => self.stack.push(RevFrame::explore(child)),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Shared prefix seek: descends to the node covering `prefix`, tracking
/// the channel of the deepest node touched.
fn seek_prefix<V>(root: &Arc<Node<V>>, prefix: &[u8]) -> (Option<Arc<Node<V>>>, WatchChannel) {
    let mut n = Arc::clone(root);
    let mut watch = root.channel.clone();
    let mut search = prefix;
    loop {
        if search.is_empty() {
            return (Some(n), watch);
        }
        let child = match n.get_edge(search[0]) {
            Some(child) => Arc::clone(child),
            None => return (None, watch),
        };
        watch = child.channel.clone();
        let plen = child.prefix.len();
        if search.len() >= plen && search[..plen] == child.prefix[..] {
            search = &search[plen..];
            n = child;
        } else if plen >= search.len() && child.prefix[..search.len()] == *search {
            // The prefix ends mid-edge; the whole child subtree matches.
            return (Some(child), watch);
        } else {
            return (None, watch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tree::Tree;
    use super::*;

    fn tree_of(keys: &[&[u8]]) -> Tree<u64> {
        let mut txn = Tree::new().txn();
        for (i, key) in keys.iter().enumerate() {
            txn.insert(key, i as u64);
        }
        txn.commit().0
    }

    fn collect_keys(iter: impl Iterator<Item = (Vec<u8>, u64)>) -> Vec<Vec<u8>> {
        iter.map(|(k, _)| k).collect()
    }

    #[test]
    fn full_iteration_is_byte_ordered() {
        let tree = tree_of(&[b"zoo", b"app", b"apple", b"ant", b"b"]);
        assert_eq!(
            collect_keys(tree.iter()),
            vec![
                b"ant".to_vec(),
                b"app".to_vec(),
                b"apple".to_vec(),
                b"b".to_vec(),
                b"zoo".to_vec()
            ]
        );
    }

    #[test]
    fn reverse_iteration_is_descending() {
        let tree = tree_of(&[b"zoo", b"app", b"apple", b"ant", b"b"]);
        let mut keys = collect_keys(tree.iter_rev());
        keys.reverse();
        assert_eq!(keys, collect_keys(tree.iter()));
    }

    #[test]
    fn prefix_iteration_bounds_the_subtree() {
        let tree = tree_of(&[b"ant", b"app", b"apple", b"approach", b"b"]);
        assert_eq!(
            collect_keys(tree.iter_prefix(b"app")),
            vec![b"app".to_vec(), b"apple".to_vec(), b"approach".to_vec()]
        );
        assert_eq!(
            collect_keys(tree.iter_prefix_rev(b"app")),
            vec![b"approach".to_vec(), b"apple".to_vec(), b"app".to_vec()]
        );
        assert!(collect_keys(tree.iter_prefix(b"c")).is_empty());
        // A prefix ending mid-edge still selects the subtree.
        assert_eq!(
            collect_keys(tree.iter_prefix(b"appl")),
            vec![b"apple".to_vec()]
        );
    }

    #[test]
    fn prefix_miss_still_surfaces_a_watch_channel() {
        let tree = tree_of(&[b"app"]);
        let iter = tree.iter_prefix(b"nothing");
        assert!(!iter.watch().is_closed());

        let mut txn = tree.txn();
        txn.insert(b"nothing-here", 9);
        let (_, notifier) = txn.commit();
        notifier.notify();
        // The miss channel was the root's, which the insert replaced.
        assert!(iter.watch().is_closed());
    }

    #[test]
    fn lower_bound_starts_at_first_key_at_or_after() {
        let tree = tree_of(&[b"b", b"bar", b"baz", b"d", b"f"]);
        assert_eq!(
            collect_keys(tree.iter_lower_bound(b"baz")),
            vec![b"baz".to_vec(), b"d".to_vec(), b"f".to_vec()]
        );
        assert_eq!(
            collect_keys(tree.iter_lower_bound(b"c")),
            vec![b"d".to_vec(), b"f".to_vec()]
        );
        assert_eq!(
            collect_keys(tree.iter_lower_bound(b"")),
            collect_keys(tree.iter())
        );
        assert!(collect_keys(tree.iter_lower_bound(b"z")).is_empty());
    }

    #[test]
    fn lower_bound_excludes_interior_leaf_below_the_bound() {
        // "ba" is a proper prefix of the bound and must not appear.
        let tree = tree_of(&[b"ba", b"bar", b"bz"]);
        assert_eq!(
            collect_keys(tree.iter_lower_bound(b"bap")),
            vec![b"bar".to_vec(), b"bz".to_vec()]
        );
    }

    #[test]
    fn reverse_lower_bound_starts_at_first_key_at_or_below() {
        let tree = tree_of(&[b"b", b"bar", b"baz", b"d", b"f"]);
        assert_eq!(
            collect_keys(tree.iter_reverse_lower_bound(b"baz")),
            vec![b"baz".to_vec(), b"bar".to_vec(), b"b".to_vec()]
        );
        assert_eq!(
            collect_keys(tree.iter_reverse_lower_bound(b"c")),
            vec![b"baz".to_vec(), b"bar".to_vec(), b"b".to_vec()]
        );
        assert_eq!(
            collect_keys(tree.iter_reverse_lower_bound(b"zzz")),
            vec![
                b"f".to_vec(),
                b"d".to_vec(),
                b"baz".to_vec(),
                b"bar".to_vec(),
                b"b".to_vec()
            ]
        );
        assert!(collect_keys(tree.iter_reverse_lower_bound(b"a")).is_empty());
    }

    #[test]
    fn reverse_lower_bound_includes_interior_leaf_prefix_of_bound() {
        let tree = tree_of(&[b"ba", b"bar", b"bz"]);
        // "ba" < "bap" < "bar": only "ba" qualifies on this branch.
        assert_eq!(
            collect_keys(tree.iter_reverse_lower_bound(b"bap")),
            vec![b"ba".to_vec()]
        );
    }

    #[test]
    fn lower_bound_with_bound_inside_an_edge() {
        let tree = tree_of(&[b"aaa", b"aab", b"aba"]);
        assert_eq!(
            collect_keys(tree.iter_lower_bound(b"aab")),
            vec![b"aab".to_vec(), b"aba".to_vec()]
        );
        assert_eq!(
            collect_keys(tree.iter_lower_bound(b"aac")),
            vec![b"aba".to_vec()]
        );
    }
}
