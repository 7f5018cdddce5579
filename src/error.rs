//! # Error Taxonomy
//!
//! Every fallible operation in arbordb returns [`Result`]. The variants of
//! [`Error`] are the full set of failure kinds the store can surface; none
//! of them are retried internally. A failed mutation inside a write
//! transaction leaves the transaction usable; the caller decides whether
//! to abort.
//!
//! Two variants deserve a note:
//!
//! - [`Error::NotFound`] is a normal outcome of `delete` on an absent
//!   primary key, not a fault. Callers are expected to match on it.
//! - [`Error::TxnClosed`] is returned by any operation on a transaction
//!   that has already committed or aborted, including a second `commit`.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure kinds surfaced by the store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Schema rejected at database construction. Never recoverable.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Operation named a table the schema does not declare.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// Operation named an index the table does not declare.
    #[error("unknown index '{index}' on table '{table}'")]
    UnknownIndex { table: String, index: String },

    /// Query arguments do not match what the indexer expects.
    #[error("argument mismatch: {0}")]
    ArgMismatch(String),

    /// Insert would map one unique secondary key to two distinct primary keys.
    #[error("unique constraint violated on index '{index}' of table '{table}'")]
    UniqueConstraint { table: String, index: String },

    /// Indexer reported missing for an index that does not allow missing.
    #[error("record has no value for required index '{index}' on table '{table}'")]
    MissingIndexValue { table: String, index: String },

    /// Delete of an absent primary key.
    #[error("not found")]
    NotFound,

    /// Operation on a committed or aborted transaction.
    #[error("transaction is closed")]
    TxnClosed,

    /// Mutation attempted through a read-only transaction.
    #[error("cannot mutate through a read-only transaction")]
    ReadOnlyTxn,

    /// Write transaction requested on a snapshot handle.
    #[error("cannot open a write transaction on a read-only snapshot")]
    ReadOnlySnapshot,
}
