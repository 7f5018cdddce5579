//! # Database Transactions
//!
//! A [`Txn`] is read-only or writable. Both capture the published root
//! map at creation; a writable transaction additionally holds the
//! database's single writer lock and lazily opens one radix
//! [`TreeTxn`](crate::radix::TreeTxn) per `(table, index)` it touches.
//!
//! ## Write path invariants
//!
//! Every mutation keeps the primary and secondary trees consistent:
//!
//! 1. Each record in the primary tree has an entry in every declared
//!    index that resolves back to its primary key.
//! 2. A unique secondary key maps to at most one primary key.
//! 3. Deletes remove every secondary entry derived from the stored
//!    record (not from the caller's argument, whose indexer output may
//!    have drifted).
//! 4. Replacing a record refreshes all its secondary entries.
//!
//! Unique-collision and missing-index checks run before the first tree
//! edit of an operation, so a failed `insert` leaves the transaction
//! exactly as it was: the error surfaces, the transaction stays usable,
//! and the invariants still hold at commit.
//!
//! ## Reads inside a write transaction
//!
//! Reads and scans see the transaction's own staged writes: they run
//! against the working root of any tree transaction already opened,
//! falling back to the snapshot for untouched indexes. Iterators pin
//! their view and stay stable across later writes in the same
//! transaction.
//!
//! ## Commit
//!
//! 1. Seal every dirty tree transaction into a new root plus the
//!    channels it must fire.
//! 2. Swap the new roots into a private copy of the root map.
//! 3. Publish the copy as the committed state.
//! 4. Fire the recorded channels.
//! 5. Release the writer lock.
//!
//! Abort discards the staging and fires nothing.

use std::mem;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::MutexGuard;

use super::changes::Change;
use super::iter::{RawIter, ResultIter};
use super::{MemDB, RootMap};
use crate::error::{Error, Result};
use crate::index::{Arg, Keys};
use crate::radix::{self, Iter, Node, Notifier, RevIter, TreeTxn};
use crate::schema::{IndexDef, TableDef, ID_INDEX, PREFIX_SUFFIX};
use crate::watch::WatchChannel;

/// Per-table staging: one tree transaction per touched index.
struct TableWrite<R> {
    primary: Option<TreeTxn<Arc<R>>>,
    secondary: HashMap<String, TreeTxn<Vec<u8>>>,
}

impl<R> Default for TableWrite<R> {
    fn default() -> Self {
        Self {
            primary: None,
            secondary: HashMap::new(),
        }
    }
}

/// A transaction over one [`MemDB`].
///
/// Dropping an uncommitted writable transaction aborts it: the staging
/// is discarded, no channels fire, and the writer lock is released.
pub struct Txn<'db, R> {
    db: &'db MemDB<R>,
    snapshot: Arc<RootMap<R>>,
    guard: Option<MutexGuard<'db, ()>>,
    dirty: HashMap<String, TableWrite<R>>,
    changes: Option<Vec<Change<R>>>,
    closed: bool,
}

/// One planned secondary-index edit, computed before any tree is
/// touched.
struct SecondaryEdit {
    index: String,
    removals: Vec<Vec<u8>>,
    additions: Vec<Vec<u8>>,
}

impl<'db, R> Txn<'db, R> {
    pub(crate) fn new(
        db: &'db MemDB<R>,
        snapshot: Arc<RootMap<R>>,
        guard: Option<MutexGuard<'db, ()>>,
    ) -> Self {
        Self {
            db,
            snapshot,
            guard,
            dirty: HashMap::new(),
            changes: None,
            closed: false,
        }
    }

    /// Starts accumulating a [`Change`] log for this transaction. Call
    /// before the first mutation; edits applied earlier are not
    /// captured.
    pub fn track_changes(&mut self) {
        if self.changes.is_none() {
            self.changes = Some(Vec::new());
        }
    }

    /// The applied-edit log, once [`Txn::track_changes`] was enabled.
    /// Remains readable after commit.
    pub fn changes(&self) -> Option<&[Change<R>]> {
        self.changes.as_deref()
    }

    /// Inserts `record` into `table`, replacing any record with the same
    /// primary key and refreshing its secondary entries.
    pub fn insert(&mut self, table: &str, record: R) -> Result<()> {
        self.ensure_writable()?;
        let catalog = Arc::clone(self.db.catalog());
        let table_def = catalog.table(table)?;

        let id_key = primary_key(table_def, &record)?;
        let record = Arc::new(record);
        let existing = {
            let view = self.primary_view(table)?;
            radix::get_leaf(&view, &id_key).map(|leaf| Arc::clone(&leaf.value))
        };

        // Plan phase: project every index and check constraints before
        // touching any tree, so a failure leaves the staging untouched.
        let mut edits: Vec<SecondaryEdit> = Vec::new();
        for def in table_def.secondary_indexes() {
            let projected = def.indexer().from_record(&record)?;
            if projected.is_missing() && !def.allows_missing() {
                return Err(Error::MissingIndexValue {
                    table: table.into(),
                    index: def.name().into(),
                });
            }
            let mut additions = projected.into_vec();
            let mut removals = match &existing {
                Some(old) => def.indexer().from_record(old)?.into_vec(),
                None => Vec::new(),
            };
            if def.is_unique() {
                let view = self.secondary_view(table, def.name())?;
                for key in &additions {
                    if let Some(leaf) = radix::get_leaf(&view, key) {
                        if leaf.value != id_key {
                            return Err(Error::UniqueConstraint {
                                table: table.into(),
                                index: def.name().into(),
                            });
                        }
                    }
                }
            } else {
                // Non-unique entries append the primary key so distinct
                // records never collide in the tree.
                for key in &mut additions {
                    key.extend_from_slice(&id_key);
                }
                for key in &mut removals {
                    key.extend_from_slice(&id_key);
                }
            }
            if removals == additions {
                // Unchanged projection: leave the entries (and their
                // watch channels) alone.
                continue;
            }
            edits.push(SecondaryEdit {
                index: def.name().to_string(),
                removals,
                additions,
            });
        }

        // Apply phase.
        self.primary_txn(table)?
            .insert(&id_key, Arc::clone(&record));
        for edit in edits {
            let tree = self.secondary_txn(table, &edit.index)?;
            for key in &edit.removals {
                tree.delete(key);
            }
            for key in edit.additions {
                tree.insert(&key, id_key.clone());
            }
        }

        if let Some(log) = &mut self.changes {
            log.push(Change::new(table, id_key, existing, Some(record)));
        }
        Ok(())
    }

    /// Deletes the record whose primary key matches `record`'s.
    /// Secondary entries are derived from the stored record, so a stale
    /// argument still cleans up correctly.
    pub fn delete(&mut self, table: &str, record: &R) -> Result<()> {
        self.ensure_writable()?;
        let catalog = Arc::clone(self.db.catalog());
        let table_def = catalog.table(table)?;

        let id_key = primary_key(table_def, record)?;
        let stored = {
            let view = self.primary_view(table)?;
            radix::get_leaf(&view, &id_key).map(|leaf| Arc::clone(&leaf.value))
        };
        let stored = stored.ok_or(Error::NotFound)?;

        self.remove_record(table_def, &id_key, &stored)?;
        if let Some(log) = &mut self.changes {
            log.push(Change::new(table, id_key, Some(stored), None));
        }
        Ok(())
    }

    /// Deletes every record matched by `get(table, index, args)`.
    /// Returns how many records were removed.
    pub fn delete_all(&mut self, table: &str, index: &str, args: &[Arg<'_>]) -> Result<usize> {
        self.ensure_writable()?;
        // Materialize the matches first so the scan is not invalidated
        // by the deletes.
        let records: Vec<Arc<R>> = self.get(table, index, args)?.collect();
        let mut deleted = 0;
        for record in records {
            match self.delete(table, &record) {
                Ok(()) => deleted += 1,
                // A multi-value index can yield the same record twice.
                Err(Error::NotFound) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(deleted)
    }

    /// Bulk delete of every record whose primary key starts with the
    /// prefix built from `args`. The index argument must be the primary
    /// index's prefix form (`"id_prefix"`); anything else is rejected.
    /// Returns whether anything was deleted.
    pub fn delete_prefix(&mut self, table: &str, index: &str, args: &[Arg<'_>]) -> Result<bool> {
        self.ensure_writable()?;
        if index != format!("{ID_INDEX}{PREFIX_SUFFIX}") {
            return Err(Error::ArgMismatch(format!(
                "delete_prefix requires the '{ID_INDEX}{PREFIX_SUFFIX}' index, got '{index}'"
            )));
        }
        let catalog = Arc::clone(self.db.catalog());
        let table_def = catalog.table(table)?;
        let prefix = table_def.primary().indexer().prefix_from_args(args)?;

        let matches: Vec<(Vec<u8>, Arc<R>)> = {
            let view = self.primary_view(table)?;
            Iter::prefix(&view, &prefix).collect()
        };
        if matches.is_empty() {
            return Ok(false);
        }

        for (id_key, record) in &matches {
            for def in table_def.secondary_indexes() {
                let mut keys = def.indexer().from_record(record)?.into_vec();
                if !def.is_unique() {
                    for key in &mut keys {
                        key.extend_from_slice(id_key);
                    }
                }
                let tree = self.secondary_txn(table, def.name())?;
                for key in &keys {
                    tree.delete(key);
                }
            }
        }
        // Remove the primary subtree in one pass; this also fires the
        // channels of every node inside it.
        self.primary_txn(table)?.delete_prefix(&prefix);

        if let Some(log) = &mut self.changes {
            for (id_key, record) in matches {
                log.push(Change::new(table, id_key, Some(record), None));
            }
        }
        Ok(true)
    }

    /// First record for the index position described by `args`, in
    /// index order.
    pub fn first(&self, table: &str, index: &str, args: &[Arg<'_>]) -> Result<Option<Arc<R>>> {
        Ok(self.first_watch(table, index, args)?.1)
    }

    /// Like [`Txn::first`], also returning the watch channel covering
    /// the lookup: the record's leaf channel on a unique exact match,
    /// otherwise the channel of the scanned scope.
    pub fn first_watch(
        &self,
        table: &str,
        index: &str,
        args: &[Arg<'_>],
    ) -> Result<(WatchChannel, Option<Arc<R>>)> {
        self.ensure_open()?;
        let catalog = Arc::clone(self.db.catalog());
        let table_def = catalog.table(table)?;
        let (def, is_prefix) = table_def.resolve_index(index)?;

        if def.is_unique() && !is_prefix && !args.is_empty() {
            let key = def.indexer().from_args(args)?;
            return self.exact_watch(table, def, &key);
        }

        let (watch, mut iter) = self.scan(table, index, args, false)?;
        Ok((watch, iter.next()))
    }

    /// Last record for the index position described by `args`.
    pub fn last(&self, table: &str, index: &str, args: &[Arg<'_>]) -> Result<Option<Arc<R>>> {
        self.ensure_open()?;
        let catalog = Arc::clone(self.db.catalog());
        let table_def = catalog.table(table)?;
        let (def, is_prefix) = table_def.resolve_index(index)?;

        if def.is_unique() && !is_prefix && !args.is_empty() {
            let key = def.indexer().from_args(args)?;
            return Ok(self.exact_watch(table, def, &key)?.1);
        }

        let (_, mut iter) = self.scan(table, index, args, true)?;
        Ok(iter.next())
    }

    /// All records whose index key matches `args`, ascending. Empty
    /// `args` scans the whole index. For a non-unique index this yields
    /// every record sharing the secondary key, ordered by primary key.
    pub fn get(&self, table: &str, index: &str, args: &[Arg<'_>]) -> Result<ResultIter<R>> {
        Ok(self.scan(table, index, args, false)?.1)
    }

    /// [`Txn::get`] in descending order.
    pub fn get_reverse(
        &self,
        table: &str,
        index: &str,
        args: &[Arg<'_>],
    ) -> Result<ResultIter<R>> {
        Ok(self.scan(table, index, args, true)?.1)
    }

    /// Like [`Txn::get`], also returning the watch channel of the
    /// scanned scope's root node.
    pub fn get_watch(
        &self,
        table: &str,
        index: &str,
        args: &[Arg<'_>],
    ) -> Result<(WatchChannel, ResultIter<R>)> {
        self.scan(table, index, args, false)
    }

    /// Records at or after the index position described by `args`,
    /// ascending.
    pub fn lower_bound(&self, table: &str, index: &str, args: &[Arg<'_>]) -> Result<ResultIter<R>> {
        self.bound_scan(table, index, args, false)
    }

    /// Records at or before the index position described by `args`,
    /// descending.
    pub fn reverse_lower_bound(
        &self,
        table: &str,
        index: &str,
        args: &[Arg<'_>],
    ) -> Result<ResultIter<R>> {
        self.bound_scan(table, index, args, true)
    }

    /// Publishes the staged state. May be called at most once; later
    /// calls (and any call on an aborted transaction) return
    /// [`Error::TxnClosed`]. Committing a read-only transaction just
    /// closes it.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.guard.is_none() {
            self.closed = true;
            return Ok(());
        }

        let dirty = mem::take(&mut self.dirty);
        let mut notifiers: Vec<Notifier> = Vec::new();
        if !dirty.is_empty() {
            let mut map = (*self.snapshot).clone();
            for (table, write) in dirty {
                let roots = match map.tables.get_mut(&table) {
                    Some(roots) => roots,
                    None => continue,
                };
                if let Some(txn) = write.primary {
                    let (tree, notifier) = txn.commit();
                    roots.primary = tree;
                    notifiers.push(notifier);
                }
                for (index, txn) in write.secondary {
                    let (tree, notifier) = txn.commit();
                    roots.secondary.insert(index, tree);
                    notifiers.push(notifier);
                }
            }
            self.db.publish(Arc::new(map));
        }
        self.db.note_commit();
        self.closed = true;

        // Watchers wake only after the new state is observable.
        for notifier in notifiers {
            notifier.notify();
        }
        self.guard = None;
        Ok(())
    }

    /// Discards the staged state: no publication, no channel fires.
    /// Idempotent; a no-op on an already-closed transaction.
    pub fn abort(&mut self) {
        if self.closed {
            return;
        }
        self.dirty.clear();
        self.changes = None;
        self.closed = true;
        self.guard = None;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::TxnClosed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if self.guard.is_none() {
            return Err(Error::ReadOnlyTxn);
        }
        Ok(())
    }

    /// Removes `stored` and every secondary entry derived from it.
    fn remove_record(
        &mut self,
        table_def: &TableDef<R>,
        id_key: &[u8],
        stored: &Arc<R>,
    ) -> Result<()> {
        for def in table_def.secondary_indexes() {
            let mut keys = def.indexer().from_record(stored)?.into_vec();
            if !def.is_unique() {
                for key in &mut keys {
                    key.extend_from_slice(id_key);
                }
            }
            let tree = self.secondary_txn(table_def.name(), def.name())?;
            for key in &keys {
                tree.delete(key);
            }
        }
        self.primary_txn(table_def.name())?.delete(id_key);
        Ok(())
    }

    /// Exact unique-index lookup with its watch channel.
    fn exact_watch(
        &self,
        table: &str,
        def: &IndexDef<R>,
        key: &[u8],
    ) -> Result<(WatchChannel, Option<Arc<R>>)> {
        if def.name() == ID_INDEX {
            let view = self.primary_view(table)?;
            let (watch, leaf) = radix::get_leaf_watch(&view, key);
            return Ok((watch, leaf.map(|l| Arc::clone(&l.value))));
        }
        let view = self.secondary_view(table, def.name())?;
        let (watch, leaf) = radix::get_leaf_watch(&view, key);
        let record = match leaf {
            Some(leaf) => {
                let primary = self.primary_view(table)?;
                radix::get_leaf(&primary, &leaf.value).map(|l| Arc::clone(&l.value))
            }
            None => None,
        };
        Ok((watch, record))
    }

    fn scan(
        &self,
        table: &str,
        index: &str,
        args: &[Arg<'_>],
        reverse: bool,
    ) -> Result<(WatchChannel, ResultIter<R>)> {
        self.ensure_open()?;
        let catalog = Arc::clone(self.db.catalog());
        let table_def = catalog.table(table)?;
        let (def, is_prefix) = table_def.resolve_index(index)?;
        let key = lookup_key(def, is_prefix, args)?;

        if def.name() == ID_INDEX {
            let view = self.primary_view(table)?;
            let (watch, raw) = if reverse {
                let iter = RevIter::prefix(&view, &key);
                (iter.watch().clone(), RawIter::PrimaryRev(iter))
            } else {
                let iter = Iter::prefix(&view, &key);
                (iter.watch().clone(), RawIter::Primary(iter))
            };
            return Ok((watch, ResultIter::new(raw)));
        }

        let view = self.secondary_view(table, def.name())?;
        let primary = self.primary_view(table)?;
        let (watch, raw) = if reverse {
            let iter = RevIter::prefix(&view, &key);
            (
                iter.watch().clone(),
                RawIter::SecondaryRev { iter, primary },
            )
        } else {
            let iter = Iter::prefix(&view, &key);
            (iter.watch().clone(), RawIter::Secondary { iter, primary })
        };
        Ok((watch, ResultIter::new(raw)))
    }

    fn bound_scan(
        &self,
        table: &str,
        index: &str,
        args: &[Arg<'_>],
        reverse: bool,
    ) -> Result<ResultIter<R>> {
        self.ensure_open()?;
        let catalog = Arc::clone(self.db.catalog());
        let table_def = catalog.table(table)?;
        let (def, is_prefix) = table_def.resolve_index(index)?;
        let key = lookup_key(def, is_prefix, args)?;

        if def.name() == ID_INDEX {
            let view = self.primary_view(table)?;
            let raw = if reverse {
                RawIter::PrimaryRev(RevIter::reverse_lower_bound(&view, &key))
            } else {
                RawIter::Primary(Iter::lower_bound(&view, &key))
            };
            return Ok(ResultIter::new(raw));
        }

        let view = self.secondary_view(table, def.name())?;
        let primary = self.primary_view(table)?;
        let raw = if reverse {
            RawIter::SecondaryRev {
                iter: RevIter::reverse_lower_bound(&view, &key),
                primary,
            }
        } else {
            RawIter::Secondary {
                iter: Iter::lower_bound(&view, &key),
                primary,
            }
        };
        Ok(ResultIter::new(raw))
    }

    /// Current primary-tree root: the staged working root when this
    /// transaction already touched it, otherwise the snapshot's.
    fn primary_view(&self, table: &str) -> Result<Arc<Node<Arc<R>>>> {
        if let Some(write) = self.dirty.get(table) {
            if let Some(txn) = &write.primary {
                return Ok(txn.root());
            }
        }
        let roots = self.table_roots(table)?;
        Ok(Arc::clone(roots.primary.root()))
    }

    fn secondary_view(&self, table: &str, index: &str) -> Result<Arc<Node<Vec<u8>>>> {
        if let Some(write) = self.dirty.get(table) {
            if let Some(txn) = write.secondary.get(index) {
                return Ok(txn.root());
            }
        }
        let roots = self.table_roots(table)?;
        match roots.secondary.get(index) {
            Some(tree) => Ok(Arc::clone(tree.root())),
            None => Err(Error::UnknownIndex {
                table: table.into(),
                index: index.into(),
            }),
        }
    }

    fn table_roots(&self, table: &str) -> Result<&super::TableRoots<R>> {
        self.snapshot
            .tables
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.into()))
    }

    fn primary_txn(&mut self, table: &str) -> Result<&mut TreeTxn<Arc<R>>> {
        let Self {
            dirty, snapshot, ..
        } = self;
        let roots = snapshot
            .tables
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.into()))?;
        let write = dirty.entry_ref(table).or_default();
        Ok(write.primary.get_or_insert_with(|| roots.primary.txn()))
    }

    fn secondary_txn(&mut self, table: &str, index: &str) -> Result<&mut TreeTxn<Vec<u8>>> {
        let Self {
            dirty, snapshot, ..
        } = self;
        let roots = snapshot
            .tables
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.into()))?;
        let tree = roots
            .secondary
            .get(index)
            .ok_or_else(|| Error::UnknownIndex {
                table: table.into(),
                index: index.into(),
            })?;
        let write = dirty.entry_ref(table).or_default();
        Ok(write
            .secondary
            .entry_ref(index)
            .or_insert_with(|| tree.txn()))
    }
}

/// Encoded primary key of `record`, via the table's `id` indexer.
fn primary_key<R>(table_def: &TableDef<R>, record: &R) -> Result<Vec<u8>> {
    match table_def.primary().indexer().from_record(record)? {
        Keys::One(key) => Ok(key),
        Keys::Missing => Err(Error::MissingIndexValue {
            table: table_def.name().into(),
            index: ID_INDEX.into(),
        }),
        Keys::Many(_) => Err(Error::InvalidSchema(format!(
            "primary index 'id' on table '{}' must produce a single key",
            table_def.name()
        ))),
    }
}

/// Lookup key for a query position. Empty `args` selects the whole
/// index.
fn lookup_key<R>(def: &IndexDef<R>, is_prefix: bool, args: &[Arg<'_>]) -> Result<Vec<u8>> {
    if args.is_empty() {
        return Ok(Vec::new());
    }
    if is_prefix {
        def.indexer().prefix_from_args(args)
    } else {
        def.indexer().from_args(args)
    }
}
