//! Batched fingerprint fetches and the retry policy around them.

use std::collections::HashMap;
use std::future::Future;

use tracing::warn;

use crate::core::schema::Column;
use crate::core::traits::Database;
use crate::error::{Result, VerifyError};
use crate::verify::hash_query::row_fingerprint_query;

/// Attempts per fetch. Zero backoff between attempts: the policy exists to
/// ride out brief driver-level blips without stretching the cutover window.
pub const RETRY_ATTEMPTS: usize = 5;

/// Run `op` up to `max_attempts` times, returning the first success or the
/// last error. Failed attempts are logged at warn level.
pub async fn with_retries<T, F, Fut>(max_attempts: usize, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    what, attempt, max_attempts, err
                );
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Fetch fingerprints for `pks` from one side.
///
/// Executes the fingerprint query through the prepared-statement interface
/// and decodes each result row as `(pk, fingerprint_bytes)`. PKs with no
/// row on this side are simply absent from the returned map; the
/// comparator treats absence as a mismatch.
pub async fn get_hashes(
    db: &dyn Database,
    schema: &str,
    table: &str,
    pk_column: &str,
    columns: &[Column],
    pks: &[u64],
) -> Result<HashMap<u64, Vec<u8>>> {
    if pks.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = row_fingerprint_query(schema, table, pk_column, columns, pks.len())?;
    let rows = db.query_prepared(&sql, pks).await?;

    let mut hashes = HashMap::with_capacity(rows.len());
    for row in rows {
        let [pk_cell, fingerprint_cell] = row.as_slice() else {
            return Err(VerifyError::fetch(format!(
                "fingerprint row from {}.{} has {} cells, expected 2",
                schema,
                table,
                row.len()
            )));
        };

        let pk = pk_cell.as_u64().ok_or_else(|| {
            VerifyError::fetch(format!(
                "fingerprint row from {}.{} has a non-integer pk cell: {:?}",
                schema, table, pk_cell
            ))
        })?;
        let fingerprint = fingerprint_cell.as_bytes().ok_or_else(|| {
            VerifyError::fetch(format!(
                "fingerprint row from {}.{} has a non-byte fingerprint cell: {:?}",
                schema, table, fingerprint_cell
            ))
        })?;

        hashes.insert(pk, fingerprint.to_vec());
    }

    Ok(hashes)
}
