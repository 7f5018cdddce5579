//! Change capture for write transactions that opted in via
//! [`Txn::track_changes`](super::Txn::track_changes). One [`Change`] is
//! appended per applied edit, in application order; callers read the log
//! after commit to feed external change streams.

use std::sync::Arc;

/// One applied edit: the record before and after, keyed by table and
/// primary key. An insert has no `before`, a delete no `after`, an
/// update both.
pub struct Change<R> {
    pub table: String,
    pub before: Option<Arc<R>>,
    pub after: Option<Arc<R>>,
    primary_key: Vec<u8>,
}

impl<R> Change<R> {
    pub(crate) fn new(
        table: &str,
        primary_key: Vec<u8>,
        before: Option<Arc<R>>,
        after: Option<Arc<R>>,
    ) -> Self {
        Self {
            table: table.to_string(),
            before,
            after,
            primary_key,
        }
    }

    /// Encoded primary key of the affected record.
    pub fn primary_key(&self) -> &[u8] {
        &self.primary_key
    }

    pub fn created(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    pub fn updated(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }

    pub fn deleted(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for Change<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Change")
            .field("table", &self.table)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish()
    }
}

/// The ordered log of one transaction's applied edits.
pub type Changes<R> = Vec<Change<R>>;
