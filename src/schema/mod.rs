//! # Schema Catalog
//!
//! A database is constructed from a [`Schema`]: tables, each with named
//! indexes, each index backed by an [`Indexer`]. The schema is validated
//! once at construction and immutable afterwards.
//!
//! ## Invariants checked at construction
//!
//! 1. At least one table; table and index names are non-empty and unique.
//! 2. Every table declares an index named [`ID_INDEX`] that is unique
//!    and does not allow missing: the primary index, whose tree stores
//!    the authoritative records.
//!
//! ## Query-name convention
//!
//! An index name carrying the [`PREFIX_SUFFIX`] (`"age_prefix"` for
//! index `"age"`) selects the same index in prefix mode: lookup keys are
//! built with `prefix_from_args` and left open-ended.

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::index::Indexer;

/// Name of the mandatory primary index.
pub const ID_INDEX: &str = "id";

/// Suffix selecting prefix mode on an index name at query time.
pub const PREFIX_SUFFIX: &str = "_prefix";

/// Declaration of one index.
pub struct IndexSchema<R> {
    name: String,
    unique: bool,
    allow_missing: bool,
    indexer: Box<dyn Indexer<R>>,
}

impl<R> IndexSchema<R> {
    pub fn new(name: impl Into<String>, indexer: impl Indexer<R> + 'static) -> Self {
        Self {
            name: name.into(),
            unique: false,
            allow_missing: false,
            indexer: Box::new(indexer),
        }
    }

    /// Marks the index unique: one secondary key resolves to at most one
    /// primary key.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Records whose indexer reports missing are skipped instead of
    /// rejected.
    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }
}

/// Declaration of one table.
pub struct TableSchema<R> {
    name: String,
    indexes: Vec<IndexSchema<R>>,
}

impl<R> TableSchema<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    pub fn index(mut self, index: IndexSchema<R>) -> Self {
        self.indexes.push(index);
        self
    }
}

/// The full database schema.
pub struct Schema<R> {
    tables: Vec<TableSchema<R>>,
}

impl<R> Schema<R> {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn table(mut self, table: TableSchema<R>) -> Self {
        self.tables.push(table);
        self
    }

    /// Checks the construction invariants and builds the lookup catalog.
    pub(crate) fn validate(self) -> Result<Catalog<R>> {
        if self.tables.is_empty() {
            return Err(Error::InvalidSchema("schema declares no tables".into()));
        }
        let mut tables = HashMap::with_capacity(self.tables.len());
        for table in self.tables {
            if table.name.is_empty() {
                return Err(Error::InvalidSchema("table name must not be empty".into()));
            }
            if table.indexes.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "table '{}' declares no indexes",
                    table.name
                )));
            }
            let mut indexes = HashMap::with_capacity(table.indexes.len());
            for index in table.indexes {
                if index.name.is_empty() {
                    return Err(Error::InvalidSchema(format!(
                        "table '{}' has an index with an empty name",
                        table.name
                    )));
                }
                if index.name == ID_INDEX && (!index.unique || index.allow_missing) {
                    return Err(Error::InvalidSchema(format!(
                        "primary index 'id' on table '{}' must be unique and required",
                        table.name
                    )));
                }
                let def = IndexDef {
                    name: index.name.clone(),
                    unique: index.unique,
                    allow_missing: index.allow_missing,
                    indexer: index.indexer,
                };
                if indexes.insert(index.name.clone(), def).is_some() {
                    return Err(Error::InvalidSchema(format!(
                        "duplicate index '{}' on table '{}'",
                        index.name, table.name
                    )));
                }
            }
            if !indexes.contains_key(ID_INDEX) {
                return Err(Error::InvalidSchema(format!(
                    "table '{}' is missing the primary 'id' index",
                    table.name
                )));
            }
            let name = table.name.clone();
            let def = TableDef {
                name: table.name,
                indexes,
            };
            if tables.insert(name.clone(), def).is_some() {
                return Err(Error::InvalidSchema(format!("duplicate table '{name}'")));
            }
        }
        Ok(Catalog { tables })
    }
}

impl<R> Default for Schema<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated schema in lookup form.
pub(crate) struct Catalog<R> {
    tables: HashMap<String, TableDef<R>>,
}

impl<R> std::fmt::Debug for Catalog<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<R> Catalog<R> {
    pub(crate) fn table(&self, name: &str) -> Result<&TableDef<R>> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::UnknownTable(name.into()))
    }

    pub(crate) fn tables(&self) -> impl Iterator<Item = &TableDef<R>> {
        self.tables.values()
    }
}

pub(crate) struct TableDef<R> {
    name: String,
    indexes: HashMap<String, IndexDef<R>>,
}

impl<R> TableDef<R> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn index(&self, name: &str) -> Result<&IndexDef<R>> {
        self.indexes.get(name).ok_or_else(|| Error::UnknownIndex {
            table: self.name.clone(),
            index: name.into(),
        })
    }

    /// The primary index definition. Guaranteed present by validation.
    pub(crate) fn primary(&self) -> &IndexDef<R> {
        &self.indexes[ID_INDEX]
    }

    /// Resolves a query-time index name, honoring the `_prefix` suffix.
    /// Returns the definition and whether prefix mode was selected.
    pub(crate) fn resolve_index(&self, name: &str) -> Result<(&IndexDef<R>, bool)> {
        if let Some(def) = self.indexes.get(name) {
            return Ok((def, false));
        }
        if let Some(base) = name.strip_suffix(PREFIX_SUFFIX) {
            if let Some(def) = self.indexes.get(base) {
                return Ok((def, true));
            }
        }
        Err(Error::UnknownIndex {
            table: self.name.clone(),
            index: name.into(),
        })
    }

    pub(crate) fn secondary_indexes(&self) -> impl Iterator<Item = &IndexDef<R>> {
        self.indexes.values().filter(|def| def.name != ID_INDEX)
    }
}

pub(crate) struct IndexDef<R> {
    name: String,
    unique: bool,
    allow_missing: bool,
    indexer: Box<dyn Indexer<R>>,
}

impl<R> IndexDef<R> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_unique(&self) -> bool {
        self.unique
    }

    pub(crate) fn allows_missing(&self) -> bool {
        self.allow_missing
    }

    pub(crate) fn indexer(&self) -> &dyn Indexer<R> {
        self.indexer.as_ref()
    }
}
