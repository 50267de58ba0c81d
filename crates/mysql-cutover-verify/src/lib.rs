//! # mysql-cutover-verify
//!
//! Iterative verification for online MySQL migrations: prove that source
//! and target hold identical row contents without a long read lock on the
//! source, while logical replication keeps streaming row changes.
//!
//! The verifier runs in two phases around the cutover event:
//!
//! - **Pre-cutover**: every in-scope table is scanned on both sides in
//!   parallel with live writes; PKs whose fingerprints differ, plus every
//!   PK the change stream reports as mutated, land in the reverify store.
//! - **Cutover**: with writes halted, only the collected PK set is checked
//!   again. All matching means the migration is consistent; anything else
//!   fails with the offending PKs.
//!
//! Collaborators (database handles, PK cursor, change stream, schema
//! cache) are capability traits in [`core::traits`]; the verifier never
//! couples to a concrete driver.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mysql_cutover_verify::{
//!     ChangeStream, CursorFactory, Database, IterativeVerifier, SchemaCache, Table,
//!     VerifierOptions,
//! };
//!
//! async fn verify(
//!     source: Arc<dyn Database>,
//!     target: Arc<dyn Database>,
//!     cursors: Arc<dyn CursorFactory>,
//!     change_stream: Arc<dyn ChangeStream>,
//!     schema_cache: Arc<dyn SchemaCache>,
//!     tables: Vec<Arc<Table>>,
//! ) -> mysql_cutover_verify::Result<()> {
//!     let mut verifier = IterativeVerifier::new(
//!         source,
//!         target,
//!         cursors,
//!         change_stream,
//!         schema_cache,
//!         tables,
//!         VerifierOptions::default(),
//!     );
//!     verifier.initialize()?;
//!     verifier.verify_before_cutover().await?;
//!
//!     // ... halt writes and drain the change stream ...
//!
//!     let result = verifier.verify_during_cutover().await?;
//!     assert!(result.data_correct, "{}", result.message);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod pool;
pub mod verify;

// Re-exports for convenient access
pub use config::{CursorConfig, VerifierOptions};
pub use crate::core::schema::{Column, ColumnKind, Table, TableIdentifier};
pub use crate::core::traits::{
    ChangeStream, CursorFactory, Database, EventListener, PkCursor, SchemaCache,
};
pub use crate::core::value::{Cell, RowBatch, RowEvent};
pub use error::{Result, VerifyError};
pub use pool::WorkerPool;
pub use verify::{
    compare_hashes, row_fingerprint, IterativeVerifier, ReverifyBatch, ReverifyEntry,
    ReverifyStore, VerificationResult, VerificationResultAndStatus,
};
