//! # Database Core
//!
//! [`MemDB`] is the process-wide holder of one committed state: the
//! **root map**, a bundle of `(table, index) → radix-tree root` handles
//! published behind a lock-guarded atomic pointer swap. A snapshot of the
//! database is precisely one root map value.
//!
//! ## Transaction flow
//!
//! ```text
//!   reader ──▶ txn(false) ──▶ clone published root map ──▶ reads
//!
//!   writer ──▶ txn(true) ──▶ writer lock ──▶ clone root map
//!                │
//!                ├─ insert/delete ──▶ lazily open TreeTxn per touched
//!                │                    (table, index), stage copy-on-write
//!                │
//!                ├─ commit ──▶ seal TreeTxns ──▶ swap entries into a new
//!                │             root map ──▶ publish ──▶ fire channels
//!                │             ──▶ release writer lock
//!                └─ abort  ──▶ discard, fire nothing
//! ```
//!
//! ## Isolation
//!
//! Arbitrarily many read transactions run beside at most one writer.
//! Readers never take the writer lock; they clone the published root map
//! and are wait-free with respect to the writer from then on. The
//! writer's staging is invisible until publication, and publication is a
//! single pointer swap, so every reader observes exactly one committed
//! state.
//!
//! There is a single linear order of commits. Watch channels obtained
//! from a root map fire no later than the first commit that changes the
//! watched subtree relative to that root map.
//!
//! ## Re-entrancy
//!
//! The writer lock is not re-entrant: opening a write transaction while
//! the same thread holds another one deadlocks. Read transactions are
//! freely re-entrant.

mod changes;
mod iter;
mod transaction;

pub use changes::{Change, Changes};
pub use iter::ResultIter;
pub use transaction::Txn;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::radix::Tree;
use crate::schema::{Catalog, Schema};

/// One committed state: every index tree root, by table and index name.
pub(crate) struct RootMap<R> {
    pub(crate) tables: HashMap<String, TableRoots<R>>,
}

pub(crate) struct TableRoots<R> {
    /// `id-key → record`.
    pub(crate) primary: Tree<Arc<R>>,
    /// Unique: `key → id-key`. Non-unique: `(key ∥ id-key) → id-key`.
    pub(crate) secondary: HashMap<String, Tree<Vec<u8>>>,
}

impl<R> Clone for RootMap<R> {
    fn clone(&self) -> Self {
        Self {
            tables: self.tables.clone(),
        }
    }
}

impl<R> Clone for TableRoots<R> {
    fn clone(&self) -> Self {
        Self {
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
        }
    }
}

/// Read-only diagnostic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Write transactions that reached commit.
    pub committed_txns: u64,
    /// Root-map publications; trails `committed_txns` by the number of
    /// write commits that staged nothing.
    pub generation: u64,
}

/// An embedded, in-memory relational store over persistent radix trees.
///
/// Construction consumes a [`Schema`]; the schema is immutable from then
/// on. All access goes through [`MemDB::txn`].
pub struct MemDB<R> {
    catalog: Arc<Catalog<R>>,
    root: RwLock<Arc<RootMap<R>>>,
    writer: Mutex<()>,
    writable: bool,
    committed_txns: AtomicU64,
    generation: AtomicU64,
}

impl<R> MemDB<R> {
    /// Validates `schema` and builds an empty database.
    pub fn new(schema: Schema<R>) -> Result<Self> {
        let catalog = schema.validate()?;
        let mut tables = HashMap::new();
        for table in catalog.tables() {
            let secondary = table
                .secondary_indexes()
                .map(|def| (def.name().to_string(), Tree::new()))
                .collect();
            tables.insert(
                table.name().to_string(),
                TableRoots {
                    primary: Tree::new(),
                    secondary,
                },
            );
        }
        Ok(Self {
            catalog: Arc::new(catalog),
            root: RwLock::new(Arc::new(RootMap { tables })),
            writer: Mutex::new(()),
            writable: true,
            committed_txns: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        })
    }

    /// Opens a transaction. A write transaction acquires the single
    /// writer lock for its whole lifetime; a read transaction only
    /// snapshots the published root map.
    pub fn txn(&self, write: bool) -> Result<Txn<'_, R>> {
        if !write {
            return Ok(Txn::new(self, self.load_root(), None));
        }
        if !self.writable {
            return Err(Error::ReadOnlySnapshot);
        }
        let guard = self.writer.lock();
        // Load after the lock: the previous writer published before
        // releasing, so this sees the latest committed state.
        let snapshot = self.load_root();
        Ok(Txn::new(self, snapshot, Some(guard)))
    }

    /// A read-only clone of the current committed state. Write
    /// transactions on the returned handle fail with
    /// [`Error::ReadOnlySnapshot`].
    pub fn snapshot(&self) -> MemDB<R> {
        MemDB {
            catalog: Arc::clone(&self.catalog),
            root: RwLock::new(self.load_root()),
            writer: Mutex::new(()),
            writable: false,
            committed_txns: AtomicU64::new(self.committed_txns.load(Ordering::Relaxed)),
            generation: AtomicU64::new(self.generation.load(Ordering::Relaxed)),
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            committed_txns: self.committed_txns.load(Ordering::Relaxed),
            generation: self.generation.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn catalog(&self) -> &Arc<Catalog<R>> {
        &self.catalog
    }

    pub(crate) fn load_root(&self) -> Arc<RootMap<R>> {
        Arc::clone(&self.root.read())
    }

    /// Swaps the published root map. Called with the writer lock held.
    pub(crate) fn publish(&self, map: Arc<RootMap<R>>) {
        *self.root.write() = map;
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_commit(&self) {
        self.committed_txns.fetch_add(1, Ordering::Relaxed);
    }
}
