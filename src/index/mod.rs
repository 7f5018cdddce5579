//! # Indexers
//!
//! An indexer turns records and query arguments into byte keys. The core
//! never inspects record fields itself: the schema supplies an
//! [`Indexer`] per index, and field access happens inside it through a
//! caller-provided closure over the concrete record type.
//!
//! ## Capabilities
//!
//! - `from_record` projects a record to its index keys: exactly one
//!   ([`Keys::One`]), several for multi-value indexes ([`Keys::Many`]),
//!   or none ([`Keys::Missing`], which skips the row when the index
//!   allows missing and fails the insert when it does not).
//! - `from_args` builds the lookup key for an exact-match query from
//!   positional [`Arg`] values.
//! - `prefix_from_args` is like `from_args` but the result is an open
//!   prefix (no terminator); only indexers that advertise
//!   `supports_prefix` implement it.
//!
//! ## Built-in indexers
//!
//! [`StringField`], [`StringSliceField`], [`IntField`], [`UintField`],
//! [`BoolField`], [`UuidField`] cover single-field encodings;
//! [`Compound`] concatenates components positionally and [`Conditional`]
//! gates an inner indexer behind a predicate. All of them produce
//! self-delimited keys via [`crate::encoding::key`], so compound keys
//! and prefix scans compose without per-index escaping.

mod compound;
mod field;

pub use compound::{Compound, Conditional};
pub use field::{BoolField, IntField, StringField, StringSliceField, UintField, UuidField};

use uuid::Uuid;

use crate::error::{Error, Result};

/// A positional query argument. Borrowed forms keep argument lists
/// allocation-free at call sites.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<'a> {
    Str(&'a str),
    Bytes(&'a [u8]),
    Int(i64),
    UInt(u64),
    Bool(bool),
    Uuid(Uuid),
}

impl Arg<'_> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Arg::Str(_) => "string",
            Arg::Bytes(_) => "bytes",
            Arg::Int(_) => "int",
            Arg::UInt(_) => "uint",
            Arg::Bool(_) => "bool",
            Arg::Uuid(_) => "uuid",
        }
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(v: &'a str) -> Self {
        Arg::Str(v)
    }
}

impl<'a> From<&'a [u8]> for Arg<'a> {
    fn from(v: &'a [u8]) -> Self {
        Arg::Bytes(v)
    }
}

impl From<i64> for Arg<'_> {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<u64> for Arg<'_> {
    fn from(v: u64) -> Self {
        Arg::UInt(v)
    }
}

impl From<bool> for Arg<'_> {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<Uuid> for Arg<'_> {
    fn from(v: Uuid) -> Self {
        Arg::Uuid(v)
    }
}

/// Keys projected from one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Keys {
    /// The record has no value for this index.
    Missing,
    One(Vec<u8>),
    /// Multi-value index: the record is indexed once per key.
    Many(Vec<Vec<u8>>),
}

impl Keys {
    pub fn is_missing(&self) -> bool {
        matches!(self, Keys::Missing)
    }

    pub(crate) fn into_vec(self) -> Vec<Vec<u8>> {
        match self {
            Keys::Missing => Vec::new(),
            Keys::One(key) => vec![key],
            Keys::Many(keys) => keys,
        }
    }
}

/// The pluggable capability that maps records and query arguments to
/// byte keys. Implementations must be deterministic: the same record
/// always projects to the same keys.
pub trait Indexer<R>: Send + Sync {
    /// Projects a record to its index keys.
    fn from_record(&self, record: &R) -> Result<Keys>;

    /// Builds the exact-match lookup key from positional arguments.
    fn from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>>;

    /// Builds an open prefix from positional arguments. Only meaningful
    /// when [`Indexer::supports_prefix`] is true.
    fn prefix_from_args(&self, args: &[Arg<'_>]) -> Result<Vec<u8>> {
        let _ = args;
        Err(Error::ArgMismatch(
            "index does not support prefix queries".into(),
        ))
    }

    /// Whether this indexer can produce open prefixes.
    fn supports_prefix(&self) -> bool {
        false
    }
}

/// Unwraps the single argument every scalar indexer expects.
pub(crate) fn single_arg<'a, 'b>(args: &'b [Arg<'a>]) -> Result<&'b Arg<'a>> {
    match args {
        [arg] => Ok(arg),
        _ => Err(Error::ArgMismatch(format!(
            "expected exactly 1 argument, got {}",
            args.len()
        ))),
    }
}
