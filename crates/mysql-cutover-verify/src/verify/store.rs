//! The reverify store: PKs suspected of divergence during pre-cutover,
//! queued for definitive checking at cutover.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::schema::{Table, TableIdentifier};

/// How often (in unique rows) the store logs a progress checkpoint.
const EMIT_LOG_PER_ROW_COUNT: u64 = 10_000;

/// A suspected-divergent row, produced by the scanner or the change
/// listener.
#[derive(Debug, Clone)]
pub struct ReverifyEntry {
    /// The row's primary key.
    pub pk: u64,
    /// The table the row belongs to.
    pub table: Arc<Table>,
}

/// One cutover work unit: up to `batch_size` PKs of a single table.
#[derive(Debug, Clone)]
pub struct ReverifyBatch {
    /// The table, as a lightweight identifier; resolve through the schema
    /// cache before fetching.
    pub table: TableIdentifier,
    /// The PKs to reverify. Never empty, never longer than the configured
    /// batch size.
    pub pks: Vec<u64>,
}

/// Deduplicated `(table, pk)` set with a freeze-into-batches phase change.
///
/// Written by exactly one task during pre-cutover (the ingestion-channel
/// consumer), frozen by the controller at the start of cutover, read-only
/// afterwards. Freezing drains the map table-by-table to cap peak memory.
#[derive(Debug)]
pub struct ReverifyStore {
    map: Option<HashMap<TableIdentifier, HashSet<u64>>>,
    frozen: Option<Arc<Vec<ReverifyBatch>>>,
    row_count: u64,
}

impl ReverifyStore {
    /// Create an empty, unfrozen store.
    pub fn new() -> Self {
        Self {
            map: Some(HashMap::new()),
            frozen: None,
            row_count: 0,
        }
    }

    /// Insert an entry. Returns `true` when `(table, pk)` was not present
    /// before; duplicate additions are no-ops. Once the store is frozen no
    /// addition succeeds.
    pub fn add(&mut self, entry: ReverifyEntry) -> bool {
        let Some(map) = self.map.as_mut() else {
            warn!(
                "reverify store is frozen; dropping entry for {} pk {}",
                entry.table.full_name(),
                entry.pk
            );
            return false;
        };

        let inserted = map.entry(entry.table.identifier()).or_default().insert(entry.pk);
        if inserted {
            self.row_count += 1;
            if self.row_count % EMIT_LOG_PER_ROW_COUNT == 0 {
                debug!("{} rows queued for reverification so far", self.row_count);
            }
        }
        inserted
    }

    /// Number of unique rows added so far.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Whether the store has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Freeze the store and partition each table's PK set into chunks of at
    /// most `batch_size`.
    ///
    /// No ordering is promised across tables or within a table's chunks.
    /// Calling again on a frozen store returns the same batches.
    pub fn freeze_and_batch_by_table(&mut self, batch_size: usize) -> Arc<Vec<ReverifyBatch>> {
        if let Some(frozen) = &self.frozen {
            return frozen.clone();
        }

        let map = self.map.take().unwrap_or_default();
        let mut batches = Vec::new();

        for (table, pk_set) in map {
            let mut pks = Vec::with_capacity(batch_size.min(pk_set.len()));
            for pk in pk_set {
                pks.push(pk);
                if pks.len() >= batch_size {
                    batches.push(ReverifyBatch {
                        table: table.clone(),
                        pks: std::mem::replace(&mut pks, Vec::with_capacity(batch_size)),
                    });
                }
            }
            if !pks.is_empty() {
                batches.push(ReverifyBatch {
                    table: table.clone(),
                    pks,
                });
            }
            // The per-table set is dropped here, before the next table is
            // drained.
        }

        let frozen = Arc::new(batches);
        self.frozen = Some(frozen.clone());
        frozen
    }
}

impl Default for ReverifyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, ColumnKind};

    fn table(name: &str) -> Arc<Table> {
        Arc::new(Table {
            schema: "shop".to_string(),
            name: name.to_string(),
            columns: vec![Column::new("id", ColumnKind::Integer)],
            primary_key: "id".to_string(),
        })
    }

    fn entry(table_ref: &Arc<Table>, pk: u64) -> ReverifyEntry {
        ReverifyEntry {
            pk,
            table: table_ref.clone(),
        }
    }

    #[test]
    fn test_duplicate_adds_are_deduplicated() {
        let t = table("t1");
        let mut store = ReverifyStore::new();

        assert!(store.add(entry(&t, 42)));
        assert!(!store.add(entry(&t, 42)));
        assert!(!store.add(entry(&t, 42)));
        assert_eq!(store.row_count(), 1);

        let batches = store.freeze_and_batch_by_table(100);
        let occurrences: usize = batches
            .iter()
            .map(|b| b.pks.iter().filter(|pk| **pk == 42).count())
            .sum();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn test_frozen_batches_cover_all_added_pks() {
        let t1 = table("t1");
        let t2 = table("t2");
        let mut store = ReverifyStore::new();

        let mut expected: Vec<(TableIdentifier, u64)> = Vec::new();
        for pk in 0..25 {
            store.add(entry(&t1, pk));
            expected.push((t1.identifier(), pk));
        }
        for pk in 100..103 {
            store.add(entry(&t2, pk));
            expected.push((t2.identifier(), pk));
        }

        let batches = store.freeze_and_batch_by_table(10);
        let mut actual: Vec<(TableIdentifier, u64)> = batches
            .iter()
            .flat_map(|b| b.pks.iter().map(|pk| (b.table.clone(), *pk)))
            .collect();

        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_batches_respect_batch_size() {
        let t = table("t1");
        let mut store = ReverifyStore::new();
        for pk in 0..25 {
            store.add(entry(&t, pk));
        }

        let batches = store.freeze_and_batch_by_table(10);
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| !b.pks.is_empty()));
        assert!(batches.iter().all(|b| b.pks.len() <= 10));
        let total: usize = batches.iter().map(|b| b.pks.len()).sum();
        assert_eq!(total, 25);
    }

    #[test]
    fn test_frozen_store_rejects_additions() {
        let t = table("t1");
        let mut store = ReverifyStore::new();
        store.add(entry(&t, 1));
        store.freeze_and_batch_by_table(10);

        assert!(store.is_frozen());
        assert!(!store.add(entry(&t, 2)));

        // The late addition is not reflected in the batches.
        let batches = store.freeze_and_batch_by_table(10);
        let total: usize = batches.iter().map(|b| b.pks.len()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_freeze_is_idempotent() {
        let t = table("t1");
        let mut store = ReverifyStore::new();
        for pk in 0..5 {
            store.add(entry(&t, pk));
        }

        let first = store.freeze_and_batch_by_table(2);
        let second = store.freeze_and_batch_by_table(99);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_empty_store_freezes_to_no_batches() {
        let mut store = ReverifyStore::new();
        let batches = store.freeze_and_batch_by_table(10);
        assert!(batches.is_empty());
    }
}
