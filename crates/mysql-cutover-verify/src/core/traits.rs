//! Capability interfaces connecting the verifier to its collaborators.
//!
//! The verifier never touches a concrete database driver, binlog decoder,
//! or schema introspector. The migration driver supplies these:
//!
//! - [`Database`]: executes the fingerprint query on one side
//! - [`PkCursor`] / [`CursorFactory`]: paginates a table by primary key
//! - [`ChangeStream`] / [`EventListener`]: delivers row-change events
//! - [`SchemaCache`]: resolves `(schema, table)` to metadata

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::schema::Table;
use crate::core::value::{Cell, RowBatch, RowEvent};
use crate::error::Result;

/// A borrowed handle to one database (source or target).
///
/// The single method is the prepared-statement interface on purpose: the
/// plain-text query interface returns uniformly typed byte strings that
/// obscure the PK's numeric type, so it is not representable here. The
/// prepared statement is scoped to the call and released before it returns.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute `sql` as a prepared statement with `params` bound in order,
    /// returning all result rows as variant-typed cells.
    async fn query_prepared(&self, sql: &str, params: &[u64]) -> Result<Vec<Vec<Cell>>>;
}

/// A cursor over one table, paginated by primary key in ascending order.
///
/// The cursor takes no row locks and stops when a page comes back empty.
#[async_trait]
pub trait PkCursor: Send {
    /// Fetch the next page, or `None` once the table is exhausted.
    async fn next_batch(&mut self) -> Result<Option<RowBatch>>;
}

/// Builds cursors. The verifier asks for PK-only pages up to `max_pk`.
pub trait CursorFactory: Send + Sync {
    /// Open a cursor over `table` without row locks, selecting only
    /// `columns_to_select` (already quoted), bounded above by `max_pk`.
    fn cursor_without_row_lock(
        &self,
        table: Arc<Table>,
        max_pk: u64,
        columns_to_select: Vec<String>,
    ) -> Box<dyn PkCursor>;
}

/// Receives batches of row-change events during pre-cutover.
///
/// Returning an error fails the event batch upstream; the stream driver
/// decides whether that is fatal for the migration.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Handle one ordered batch of events.
    async fn handle_events(&self, events: Vec<RowEvent>) -> Result<()>;
}

/// The ordered feed of row-level change events from the source.
pub trait ChangeStream: Send + Sync {
    /// Register a listener. Listeners stay attached for the lifetime of
    /// the stream.
    fn add_event_listener(&self, listener: Arc<dyn EventListener>);
}

/// Resolves table metadata maintained by the migration driver.
pub trait SchemaCache: Send + Sync {
    /// Look up a table, or `None` if the cache has never seen it.
    fn get(&self, schema_name: &str, table_name: &str) -> Option<Arc<Table>>;
}

/// A map-backed schema cache, sufficient for drivers that preload metadata.
impl SchemaCache for std::collections::HashMap<(String, String), Arc<Table>> {
    fn get(&self, schema_name: &str, table_name: &str) -> Option<Arc<Table>> {
        std::collections::HashMap::get(self, &(schema_name.to_string(), table_name.to_string()))
            .cloned()
    }
}
