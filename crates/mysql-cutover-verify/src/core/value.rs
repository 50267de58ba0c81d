//! Variant-typed result cells and the row containers that carry them.
//!
//! The runtime type of a result cell depends on the driver's wire protocol
//! (binary vs text), so the boundary is specified here: a PK decodes as an
//! unsigned 64-bit integer, a fingerprint decodes as raw bytes, and any
//! other shape is rejected by the caller with its own error kind.

use crate::core::schema::Table;
use crate::error::{Result, VerifyError};
use std::sync::Arc;

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// SQL NULL.
    Null,
    /// Unsigned integer (binary protocol).
    Unsigned(u64),
    /// Signed integer (binary protocol).
    Signed(i64),
    /// Raw bytes (binary columns, or the text protocol's uniform shape).
    Bytes(Vec<u8>),
    /// Text.
    Text(String),
}

impl Cell {
    /// Decode this cell as an unsigned 64-bit primary key.
    ///
    /// Accepts unsigned and non-negative signed integers; everything else
    /// is `None` so the caller can attach the right error kind.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Cell::Unsigned(v) => Some(*v),
            Cell::Signed(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Decode this cell as a raw byte sequence (row fingerprints).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Cell::Bytes(b) => Some(b),
            Cell::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

/// One page of cursor output: rows of cells plus enough shape information
/// to find the PK in each row.
#[derive(Debug, Clone)]
pub struct RowBatch {
    table: Arc<Table>,
    rows: Vec<Vec<Cell>>,
    pk_index: usize,
}

impl RowBatch {
    /// Create a batch. `pk_index` is the position of the PK cell within
    /// each row of `rows`.
    pub fn new(table: Arc<Table>, rows: Vec<Vec<Cell>>, pk_index: usize) -> Self {
        Self {
            table,
            rows,
            pk_index,
        }
    }

    /// The rows in this batch.
    pub fn values(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Position of the PK cell within each row.
    pub fn pk_index(&self) -> usize {
        self.pk_index
    }

    /// Schema of the table this batch was read from.
    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }
}

/// A row-change notification from the change stream.
#[derive(Debug, Clone)]
pub struct RowEvent {
    /// Table the change applies to.
    pub table: Arc<Table>,
    /// The affected row's PK cell, still in wire shape.
    pub pk: Cell,
}

impl RowEvent {
    /// Create an event.
    pub fn new(table: Arc<Table>, pk: Cell) -> Self {
        Self { table, pk }
    }

    /// Extract the primary key.
    pub fn pk(&self) -> Result<u64> {
        self.pk.as_u64().ok_or_else(|| {
            VerifyError::PkExtract(format!(
                "event for table {} carries non-integer pk cell {:?}",
                self.table.full_name(),
                self.pk
            ))
        })
    }
}
