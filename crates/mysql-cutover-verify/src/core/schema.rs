//! Table and column metadata consumed by the verifier.
//!
//! These are the shapes the schema cache collaborator hands out. The
//! verifier never introspects the database itself; it trusts the cache
//! the migration driver maintains.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Type class of a column, as far as fingerprinting cares.
///
/// Only [`ColumnKind::Float`] changes fingerprint behavior (the `-0`
/// normalization); the remaining variants exist so schema caches can
/// round-trip what they know without lossy folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Integer types (tinyint through bigint).
    Integer,
    /// Floating-point types (float, double).
    Float,
    /// Fixed-point types (decimal, numeric).
    Decimal,
    /// Character types (char, varchar, text).
    Text,
    /// Binary types (binary, varbinary, blob).
    Binary,
    /// Temporal types (date, time, datetime, timestamp).
    DateTime,
    /// Anything else (enum, set, json, spatial).
    Other,
}

/// A single column of a verified table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Type class, used by the fingerprint normalizer.
    pub kind: ColumnKind,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Metadata for one in-scope table.
///
/// The verifier requires a single-column unsigned integer primary key;
/// `primary_key` names that column, which must appear in `columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Schema (database) name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Ordered columns, fingerprinted in this order.
    pub columns: Vec<Column>,
    /// Name of the single integer primary key column.
    pub primary_key: String,
}

impl Table {
    /// Fully qualified name for logging.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// The lightweight identifier used as a map key.
    pub fn identifier(&self) -> TableIdentifier {
        TableIdentifier {
            schema_name: self.schema.clone(),
            table_name: self.name.clone(),
        }
    }

    /// Whether the declared primary key is an integer column of this table.
    pub fn has_integer_pk(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.name == self.primary_key && c.kind == ColumnKind::Integer)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A comparable, lightweight key for a `(schema, table)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableIdentifier {
    /// Schema (database) name.
    pub schema_name: String,
    /// Table name.
    pub table_name: String,
}

impl TableIdentifier {
    /// Create an identifier.
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
        }
    }
}

impl From<&Table> for TableIdentifier {
    fn from(table: &Table) -> Self {
        table.identifier()
    }
}

impl From<&Arc<Table>> for TableIdentifier {
    fn from(table: &Arc<Table>) -> Self {
        table.identifier()
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.table_name)
    }
}
