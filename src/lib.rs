//! # arbordb - Embedded In-Memory Relational Store
//!
//! arbordb keeps user-defined tables with multiple secondary indexes
//! entirely in memory, on top of persistent (immutable) radix trees.
//! It provides atomic, consistent, isolated transactions (no
//! durability) with long-lived snapshot reads beside a single writer,
//! and watch channels that let callers block until a query's scope may
//! have changed.
//!
//! ## Quick Start
//!
//! ```ignore
//! use arbordb::{Arg, IndexSchema, IntField, MemDB, Schema, StringField, TableSchema};
//!
//! struct Person { email: String, name: String, age: i64 }
//!
//! let schema = Schema::new().table(
//!     TableSchema::new("person")
//!         .index(IndexSchema::new("id",
//!             StringField::new(|p: &Person| Some(p.email.as_str()))).unique())
//!         .index(IndexSchema::new("age",
//!             IntField::new(8, |p: &Person| p.age))),
//! );
//! let db = MemDB::new(schema)?;
//!
//! let mut txn = db.txn(true)?;
//! txn.insert("person", Person {
//!     email: "joe@aol.com".into(), name: "Joe".into(), age: 30,
//! })?;
//! txn.commit()?;
//!
//! let read = db.txn(false)?;
//! let joe = read.first("person", "id", &[Arg::Str("joe@aol.com")])?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │        Public API (MemDB, Txn)       │
//! ├──────────────────────────────────────┤
//! │  Schema Catalog  │  Change Capture   │
//! ├──────────────────┴───────────────────┤
//! │    Indexers (record -> byte keys)    │
//! ├──────────────────────────────────────┤
//! │     Key Encoding (order-preserving)  │
//! ├──────────────────────────────────────┤
//! │  Persistent Radix Trees + Watchers   │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! - Readers snapshot the published root map; they never block and
//!   never see a half-applied write.
//! - One writer at a time, serialized by an exclusive lock held for the
//!   transaction's lifetime.
//! - Commit publishes a new root map with a pointer swap, then fires
//!   the watch channels of everything it replaced.
//!
//! Records handed to [`Txn::insert`] are shared with the database by
//! pointer; mutating a record after insertion (through interior
//! mutability) is outside the store's contract.
//!
//! ## Module Overview
//!
//! - [`radix`]: persistent radix tree, tree transactions, iterators
//! - [`watch`]: signal-once channels, watch sets, cancellation
//! - [`encoding`]: byte-comparable field encodings
//! - [`index`]: indexer capability and the built-in field indexers
//! - [`schema`]: schema declaration and validation
//! - [`database`]: root map, database transactions, change capture

pub mod database;
pub mod encoding;
pub mod error;
pub mod index;
pub mod radix;
pub mod schema;
pub mod watch;

pub use database::{Change, Changes, MemDB, ResultIter, Stats, Txn};
pub use error::{Error, Result};
pub use index::{
    Arg, BoolField, Compound, Conditional, IntField, Indexer, Keys, StringField,
    StringSliceField, UintField, UuidField,
};
pub use radix::{Notifier, Tree, TreeTxn};
pub use schema::{IndexSchema, Schema, TableSchema, ID_INDEX, PREFIX_SUFFIX};
pub use watch::{CancelToken, WatchChannel, WatchSet};
