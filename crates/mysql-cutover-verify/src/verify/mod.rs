//! Iterative verification around the cutover of an online migration.
//!
//! The verifier proves source and target hold identical row contents in
//! two phases:
//!
//! - **Pre-cutover**: scan every in-scope table on both sides while writes
//!   are still flowing. Fingerprint mismatches at this point are only
//!   *suspicions* (a row may have changed between the paired fetches), so
//!   they are queued in the reverify store together with every PK the
//!   change stream reports as mutated.
//! - **Cutover**: with writes halted and the change stream drained, the
//!   queued PK set is re-verified. A mismatch now is definitive.
//!
//! Pre-computing the suspicious set during live writes is what keeps the
//! cutover window short: only the suspects are checked while traffic is
//! stopped.

pub mod compare;
pub mod fetcher;
pub mod hash_query;
pub mod store;
pub mod types;

pub use compare::compare_hashes;
pub use fetcher::{get_hashes, with_retries};
pub use hash_query::{row_fingerprint, row_fingerprint_query};
pub use store::{ReverifyBatch, ReverifyEntry, ReverifyStore};
pub use types::{VerificationResult, VerificationResultAndStatus};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::VerifierOptions;
use crate::core::identifier::quote_mysql;
use crate::core::schema::Table;
use crate::core::traits::{
    ChangeStream, CursorFactory, Database, EventListener, SchemaCache,
};
use crate::core::value::RowEvent;
use crate::error::{Result, VerifyError};
use crate::pool::WorkerPool;
use fetcher::RETRY_ATTEMPTS;

/// Issues the paired source/target fetches for a PK set and reports the
/// mismatched PKs. Shared by the scanner and the cutover reverifier.
struct FingerprintComparator {
    source_db: Arc<dyn Database>,
    target_db: Arc<dyn Database>,
    database_rewrites: HashMap<String, String>,
    table_rewrites: HashMap<String, String>,
}

impl FingerprintComparator {
    /// Fetch both sides concurrently, each under the retry policy, and
    /// compare. The target side is addressed through the rewrite maps;
    /// missing keys mean the name is unchanged.
    async fn mismatched_pks(&self, table: &Table, pks: &[u64]) -> Result<Vec<u64>> {
        let target_schema = self
            .database_rewrites
            .get(&table.schema)
            .unwrap_or(&table.schema);
        let target_table = self.table_rewrites.get(&table.name).unwrap_or(&table.name);

        let source = with_retries(RETRY_ATTEMPTS, "get fingerprints from source db", || {
            get_hashes(
                self.source_db.as_ref(),
                &table.schema,
                &table.name,
                &table.primary_key,
                &table.columns,
                pks,
            )
        });
        let target = with_retries(RETRY_ATTEMPTS, "get fingerprints from target db", || {
            get_hashes(
                self.target_db.as_ref(),
                target_schema,
                target_table,
                &table.primary_key,
                &table.columns,
                pks,
            )
        });

        let (source, target) = tokio::join!(source, target);
        Ok(compare_hashes(&source?, &target?))
    }
}

/// The listener registered on the change stream during pre-cutover.
///
/// Holds only a weak sender: the controller's drop of the last strong
/// sender at the start of cutover closes the ingestion channel, and the
/// listener cannot keep it open.
struct ChangeEventListener {
    reverify_tx: mpsc::WeakSender<ReverifyEntry>,
    cutover_started: Arc<AtomicBool>,
    ignored_tables: Vec<String>,
}

#[async_trait]
impl EventListener for ChangeEventListener {
    async fn handle_events(&self, events: Vec<RowEvent>) -> Result<()> {
        if self.cutover_started.load(Ordering::SeqCst) {
            return Err(VerifyError::protocol(
                "cutover started but received change event",
            ));
        }

        for event in events {
            if self
                .ignored_tables
                .iter()
                .any(|ignored| *ignored == event.table.name)
            {
                continue;
            }

            let pk = event.pk()?;
            let Some(tx) = self.reverify_tx.upgrade() else {
                return Err(VerifyError::protocol(
                    "change event received after the reverify channel closed",
                ));
            };
            let entry = ReverifyEntry {
                pk,
                table: event.table.clone(),
            };
            if tx.send(entry).await.is_err() {
                return Err(VerifyError::protocol(
                    "reverify channel consumer is gone",
                ));
            }
        }

        Ok(())
    }
}

/// Everything a pre-cutover table scan needs, shared across scanner tasks.
struct ScanContext {
    cursors: Arc<dyn CursorFactory>,
    comparator: Arc<FingerprintComparator>,
    reverify_tx: mpsc::Sender<ReverifyEntry>,
}

/// Scan one table: page through its PKs, fingerprint both sides per page,
/// and queue every mismatched PK for reverification.
async fn verify_table_before_cutover(ctx: Arc<ScanContext>, table: Arc<Table>) -> Result<()> {
    // The cursor stops when a page comes back empty, so the bound is just
    // "no bound".
    let columns_to_select = vec![quote_mysql(&table.primary_key)?];
    let mut cursor = ctx
        .cursors
        .cursor_without_row_lock(table.clone(), u64::MAX, columns_to_select);

    while let Some(batch) = cursor.next_batch().await? {
        let mut pks = Vec::with_capacity(batch.size());
        for row in batch.values() {
            let cell = row.get(batch.pk_index()).ok_or_else(|| {
                VerifyError::cursor(format!(
                    "row from {} is missing the pk cell",
                    table.full_name()
                ))
            })?;
            let pk = cell.as_u64().ok_or_else(|| {
                VerifyError::cursor(format!(
                    "pk cell from {} has unexpected shape: {:?}",
                    table.full_name(),
                    cell
                ))
            })?;
            pks.push(pk);
        }

        let mismatched = ctx.comparator.mismatched_pks(batch.table(), &pks).await?;
        if mismatched.is_empty() {
            continue;
        }

        // Not failures yet: a row written between the two fetches looks
        // mismatched here and is cleared at cutover.
        info!(
            "mismatched rows on {} will be re-verified: {:?}",
            batch.table().full_name(),
            mismatched
        );
        for pk in mismatched {
            let entry = ReverifyEntry {
                pk,
                table: batch.table().clone(),
            };
            if ctx.reverify_tx.send(entry).await.is_err() {
                return Err(VerifyError::protocol(
                    "reverify channel closed during pre-cutover scan",
                ));
            }
        }
    }

    Ok(())
}

/// Reverify one batch with both sides quiescent; any mismatch is final.
async fn verify_pks_during_cutover(
    comparator: &FingerprintComparator,
    table: &Table,
    pks: &[u64],
) -> Result<VerificationResult> {
    let mismatched = comparator.mismatched_pks(table, pks).await?;
    if mismatched.is_empty() {
        Ok(VerificationResult::correct())
    } else {
        Ok(VerificationResult::failed(table.full_name(), mismatched))
    }
}

/// The state the cutover phase consumes. Detached from the verifier so the
/// phase can run inline or on a background task.
struct CutoverRun {
    reverify_tx: mpsc::Sender<ReverifyEntry>,
    consumer: JoinHandle<ReverifyStore>,
    cutover_started: Arc<AtomicBool>,
    schema_cache: Arc<dyn SchemaCache>,
    comparator: Arc<FingerprintComparator>,
    batch_size: usize,
    concurrency: usize,
}

impl CutoverRun {
    async fn execute(self) -> Result<VerificationResult> {
        let CutoverRun {
            reverify_tx,
            consumer,
            cutover_started,
            schema_cache,
            comparator,
            batch_size,
            concurrency,
        } = self;

        // From here on the listener rejects events; dropping the last
        // strong sender closes the channel so the consumer drains and
        // hands the store back.
        cutover_started.store(true, Ordering::SeqCst);
        drop(reverify_tx);
        let mut store = consumer
            .await
            .map_err(|err| VerifyError::protocol(format!("reverify consumer task failed: {err}")))?;

        let batches = store.freeze_and_batch_by_table(batch_size);
        info!(
            "starting verification during cutover: {} rows in {} batches",
            store.row_count(),
            batches.len()
        );

        let pool = WorkerPool::new(concurrency);
        let job_batches = batches.clone();
        let (results, pool_error) = pool
            .run(batches.len(), move |batch_index| {
                let batches = job_batches.clone();
                let schema_cache = schema_cache.clone();
                let comparator = comparator.clone();
                async move {
                    let batch = &batches[batch_index];
                    let Some(table) =
                        schema_cache.get(&batch.table.schema_name, &batch.table.table_name)
                    else {
                        return Err(VerifyError::config(format!(
                            "table {} is missing from the schema cache",
                            batch.table
                        )));
                    };

                    debug!(
                        "received pk batch of {} to reverify on {}",
                        batch.pks.len(),
                        table.full_name()
                    );
                    verify_pks_during_cutover(&comparator, &table, &batch.pks).await
                }
            })
            .await;

        if let Some(err) = pool_error {
            error!("error occurred in verification during cutover: {}", err);
            return Err(err);
        }

        // Every slot is scanned; the first failing result wins.
        for result in results.into_iter().flatten() {
            if !result.data_correct {
                error!("failed verification: {}", result.message);
                return Ok(result);
            }
        }

        info!("cutover verification complete");
        Ok(VerificationResult::correct())
    }
}

/// Result and error of a background run, observable while it is running.
#[derive(Default)]
struct BackgroundState {
    status: VerificationResultAndStatus,
    error: Option<Arc<VerifyError>>,
}

/// The two-phase iterative verifier.
///
/// Sequencing is enforced at entry: `initialize` precedes the phase calls,
/// `verify_before_cutover` precedes `verify_during_cutover` and
/// `start_in_background`, and the cutover phase runs at most once.
pub struct IterativeVerifier {
    options: VerifierOptions,
    tables: Vec<Arc<Table>>,
    cursors: Arc<dyn CursorFactory>,
    change_stream: Arc<dyn ChangeStream>,
    schema_cache: Arc<dyn SchemaCache>,
    comparator: Arc<FingerprintComparator>,

    store: Option<ReverifyStore>,
    reverify_tx: Option<mpsc::Sender<ReverifyEntry>>,
    reverify_rx: Option<mpsc::Receiver<ReverifyEntry>>,
    consumer: Option<JoinHandle<ReverifyStore>>,

    initialized: bool,
    before_cutover_done: bool,
    cutover_started: Arc<AtomicBool>,

    background: Option<JoinHandle<()>>,
    background_state: Arc<Mutex<BackgroundState>>,
}

impl IterativeVerifier {
    /// Create a verifier over the given collaborators.
    ///
    /// `tables` is the set scanned pre-cutover; change events may still
    /// reference other tables known to the schema cache.
    pub fn new(
        source_db: Arc<dyn Database>,
        target_db: Arc<dyn Database>,
        cursors: Arc<dyn CursorFactory>,
        change_stream: Arc<dyn ChangeStream>,
        schema_cache: Arc<dyn SchemaCache>,
        tables: Vec<Arc<Table>>,
        options: VerifierOptions,
    ) -> Self {
        let comparator = Arc::new(FingerprintComparator {
            source_db,
            target_db,
            database_rewrites: options.database_rewrites.clone(),
            table_rewrites: options.table_rewrites.clone(),
        });

        Self {
            options,
            tables,
            cursors,
            change_stream,
            schema_cache,
            comparator,
            store: None,
            reverify_tx: None,
            reverify_rx: None,
            consumer: None,
            initialized: false,
            before_cutover_done: false,
            cutover_started: Arc::new(AtomicBool::new(false)),
            background: None,
            background_state: Arc::new(Mutex::new(BackgroundState::default())),
        }
    }

    /// Validate options and tables, and create the reverify store and the
    /// ingestion channel. Must precede all phase calls.
    pub fn initialize(&mut self) -> Result<()> {
        self.options.validate()?;

        for table in &self.tables {
            if !table.has_integer_pk() {
                return Err(VerifyError::config(format!(
                    "table {} does not have a single integer primary key column",
                    table.full_name()
                )));
            }
        }

        // Capacity-1 handoff: producers block until the consumer takes the
        // entry, so the store itself needs no lock.
        let (tx, rx) = mpsc::channel(1);
        self.reverify_tx = Some(tx);
        self.reverify_rx = Some(rx);
        self.store = Some(ReverifyStore::new());
        self.initialized = true;

        info!(
            "iterative verifier initialized over {} tables",
            self.tables.len()
        );
        Ok(())
    }

    /// Run the pre-cutover phase: consume change events and scan every
    /// in-scope table, queueing suspected PKs for cutover reverification.
    ///
    /// Writes are still flowing; this returns once the scan of all tables
    /// finished, while the change listener keeps feeding the store until
    /// cutover starts.
    pub async fn verify_before_cutover(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(VerifyError::sequencing(
                "initialize must be called before verify_before_cutover",
            ));
        }
        let (mut rx, mut store) = match (self.reverify_rx.take(), self.store.take()) {
            (Some(rx), Some(store)) => (rx, store),
            _ => {
                return Err(VerifyError::sequencing(
                    "verify_before_cutover may only be called once",
                ))
            }
        };
        let Some(tx) = self.reverify_tx.as_ref() else {
            return Err(VerifyError::sequencing(
                "verification during cutover has already been started",
            ));
        };

        info!("starting pre-cutover verification");

        // The single consumer task owns the store until cutover.
        self.consumer = Some(tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                store.add(entry);
            }
            store
        }));

        debug!("attaching change event listener");
        self.change_stream
            .add_event_listener(Arc::new(ChangeEventListener {
                reverify_tx: tx.downgrade(),
                cutover_started: self.cutover_started.clone(),
                ignored_tables: self.options.ignored_tables.clone(),
            }));

        let ctx = Arc::new(ScanContext {
            cursors: self.cursors.clone(),
            comparator: self.comparator.clone(),
            reverify_tx: tx.clone(),
        });
        let tables = self.tables.clone();
        let pool = WorkerPool::new(self.options.concurrency);
        let (_, scan_error) = pool
            .run(self.tables.len(), move |table_index| {
                let ctx = ctx.clone();
                let table = tables[table_index].clone();
                async move {
                    if let Err(err) = verify_table_before_cutover(ctx, table.clone()).await {
                        error!(
                            "error during pre-cutover verification of {}: {}",
                            table.full_name(),
                            err
                        );
                        return Err(err);
                    }
                    Ok(())
                }
            })
            .await;

        self.before_cutover_done = true;
        info!("pre-cutover verification complete");

        match scan_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run the cutover phase: freeze the reverify store and definitively
    /// check every queued PK. Callers must have halted writes and drained
    /// the change stream first.
    ///
    /// A data mismatch is reported in the returned result, not as an
    /// error.
    pub async fn verify_during_cutover(&mut self) -> Result<VerificationResult> {
        let run = self.take_cutover_run()?;
        run.execute().await
    }

    /// Run the cutover phase on a background task. Use [`Self::wait`] to
    /// join it and [`Self::result`] to observe the outcome.
    pub fn start_in_background(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(VerifyError::sequencing(
                "initialize must be called before start_in_background",
            ));
        }
        if !self.before_cutover_done {
            return Err(VerifyError::sequencing(
                "verify_before_cutover must be called before start_in_background",
            ));
        }
        if self.cutover_started.load(Ordering::SeqCst) {
            return Err(VerifyError::sequencing(
                "verification during cutover has already been started",
            ));
        }

        let run = self.take_cutover_run()?;

        {
            let mut state = self
                .background_state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            state.status = VerificationResultAndStatus {
                result: None,
                start_time: Some(Utc::now()),
                done_time: None,
            };
            state.error = None;
        }

        info!("starting iterative verification in the background");

        let background_state = self.background_state.clone();
        self.background = Some(tokio::spawn(async move {
            let outcome = run.execute().await;
            let mut state = background_state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            state.status.done_time = Some(Utc::now());
            match outcome {
                Ok(result) => state.status.result = Some(result),
                Err(err) => state.error = Some(Arc::new(err)),
            }
        }));

        Ok(())
    }

    /// Wait for a background verification started with
    /// [`Self::start_in_background`] to finish.
    pub async fn wait(&mut self) {
        if let Some(handle) = self.background.take() {
            let _ = handle.await;
        }
    }

    /// The latest background verification status and error.
    pub fn result(&self) -> (VerificationResultAndStatus, Option<Arc<VerifyError>>) {
        let state = self
            .background_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        (state.status.clone(), state.error.clone())
    }

    /// Detach everything the cutover phase needs, enforcing that it
    /// happens after pre-cutover and at most once.
    fn take_cutover_run(&mut self) -> Result<CutoverRun> {
        if !self.before_cutover_done {
            return Err(VerifyError::sequencing(
                "verify_before_cutover must be called before verify_during_cutover",
            ));
        }
        let (reverify_tx, consumer) = match (self.reverify_tx.take(), self.consumer.take()) {
            (Some(tx), Some(consumer)) => (tx, consumer),
            _ => {
                return Err(VerifyError::sequencing(
                    "verification during cutover has already been started",
                ))
            }
        };

        Ok(CutoverRun {
            reverify_tx,
            consumer,
            cutover_started: self.cutover_started.clone(),
            schema_cache: self.schema_cache.clone(),
            comparator: self.comparator.clone(),
            batch_size: self.options.cursor.batch_size,
            concurrency: self.options.concurrency,
        })
    }
}
