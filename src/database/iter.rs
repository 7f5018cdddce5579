//! Result iterators. They own `Arc`s into the trees they scan, so they
//! stay valid, and keep yielding the state they were created from,
//! while the transaction continues to stage writes.

use std::sync::Arc;

use crate::radix::{self, Iter, Node, RevIter};

/// Iterator over the records selected by a scan, in index-key order
/// (forward or reverse per the query that produced it).
///
/// Secondary-index trees store encoded primary keys; the iterator
/// dereferences them through the primary tree transparently, so the item
/// type is always the record.
pub struct ResultIter<R> {
    raw: RawIter<R>,
}

pub(crate) enum RawIter<R> {
    Primary(Iter<Arc<R>>),
    PrimaryRev(RevIter<Arc<R>>),
    Secondary {
        iter: Iter<Vec<u8>>,
        primary: Arc<Node<Arc<R>>>,
    },
    SecondaryRev {
        iter: RevIter<Vec<u8>>,
        primary: Arc<Node<Arc<R>>>,
    },
}

impl<R> ResultIter<R> {
    pub(crate) fn new(raw: RawIter<R>) -> Self {
        Self { raw }
    }
}

impl<R> std::fmt::Debug for ResultIter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.raw {
            RawIter::Primary(_) => "primary",
            RawIter::PrimaryRev(_) => "primary_rev",
            RawIter::Secondary { .. } => "secondary",
            RawIter::SecondaryRev { .. } => "secondary_rev",
        };
        f.debug_struct("ResultIter").field("index", &kind).finish()
    }
}

fn deref_primary<R>(primary: &Arc<Node<Arc<R>>>, id_key: &[u8]) -> Option<Arc<R>> {
    let leaf = radix::get_leaf(primary, id_key);
    debug_assert!(
        leaf.is_some(),
        "secondary entry points at a missing primary key"
    );
    leaf.map(|l| Arc::clone(&l.value))
}

impl<R> Iterator for ResultIter<R> {
    type Item = Arc<R>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            return match &mut self.raw {
                RawIter::Primary(iter) => iter.next().map(|(_, record)| record),
                RawIter::PrimaryRev(iter) => iter.next().map(|(_, record)| record),
                RawIter::Secondary { iter, primary } => {
                    let (_, id_key) = iter.next()?;
                    match deref_primary(primary, &id_key) {
                        Some(record) => Some(record),
                        None => continue,
                    }
                }
                RawIter::SecondaryRev { iter, primary } => {
                    let (_, id_key) = iter.next()?;
                    match deref_primary(primary, &id_key) {
                        Some(record) => Some(record),
                        None => continue,
                    }
                }
            };
        }
    }
}
