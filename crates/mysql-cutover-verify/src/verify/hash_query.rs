//! Row fingerprint SQL generation and the matching Rust digest.
//!
//! A row's fingerprint is `MD5(CONCAT(MD5(N(c1)), MD5(N(c2)), ...))` over
//! the table's ordered columns, computed server-side so whole pages can be
//! digested in one round trip. `N` normalizes values before hashing:
//!
//! - NULL becomes the literal string `'NULL'`. This distinguishes NULL from
//!   the empty string but collides NULL with a real `"NULL"` string value;
//!   the collision is documented and asserted in tests.
//! - A float column reading `-0` becomes `0`, since some engines emit `-0`
//!   for zero after a round trip.
//!
//! MD5 is load-bearing: the bytes must match what `MD5()` produces on a
//! MySQL-compatible server, so [`row_fingerprint`] reproduces the digest
//! bit-for-bit for fakes and tests. Swapping the algorithm requires
//! changing both sides in lockstep.

use md5::{Digest, Md5};

use crate::core::identifier::{qualify_mysql, quote_mysql};
use crate::core::schema::{Column, ColumnKind};
use crate::error::{Result, VerifyError};

/// Quote a column reference, substituting zero for negative zero on float
/// columns before it reaches the digest.
pub fn normalize_column_expr(column: &Column) -> Result<String> {
    let quoted = quote_mysql(&column.name)?;
    Ok(match column.kind {
        ColumnKind::Float => format!("(IF ({quoted} = '-0', 0, {quoted}))"),
        _ => quoted,
    })
}

/// Build the fingerprint query for a PK set of size `pk_count`.
///
/// Emits two columns per row: the PK and `row_fingerprint`, ordered by PK
/// so callers see a deterministic stream. The PK set is bound as one
/// placeholder per value; execute this through the prepared-statement
/// interface only.
pub fn row_fingerprint_query(
    schema: &str,
    table: &str,
    pk_column: &str,
    columns: &[Column],
    pk_count: usize,
) -> Result<String> {
    if pk_count == 0 {
        return Err(VerifyError::config(
            "fingerprint query requires at least one pk",
        ));
    }

    let quoted_pk = quote_mysql(pk_column)?;

    let mut column_hashes = Vec::with_capacity(columns.len());
    for column in columns {
        column_hashes.push(format!(
            "MD5(COALESCE({}, 'NULL'))",
            normalize_column_expr(column)?
        ));
    }

    let placeholders = vec!["?"; pk_count].join(", ");

    Ok(format!(
        "SELECT {pk}, MD5(CONCAT({hashes})) AS row_fingerprint FROM {from} WHERE {pk} IN ({placeholders}) ORDER BY {pk}",
        pk = quoted_pk,
        hashes = column_hashes.join(", "),
        from = qualify_mysql(schema, table)?,
    ))
}

/// Compute the fingerprint of one row exactly as the server would.
///
/// `values` are the columns' textual serializations in column order, `None`
/// for NULL. The result is the lowercase-hex outer digest as bytes, the
/// same shape the fingerprint column comes back in.
pub fn row_fingerprint(values: &[Option<&str>], columns: &[Column]) -> Vec<u8> {
    debug_assert_eq!(values.len(), columns.len());

    let mut concatenated = String::with_capacity(values.len() * 32);
    for (value, column) in values.iter().zip(columns) {
        let normalized = match value {
            None => "NULL",
            Some(v) if column.kind == ColumnKind::Float && *v == "-0" => "0",
            Some(v) => v,
        };
        let column_digest = Md5::digest(normalized.as_bytes());
        concatenated.push_str(&format!("{:x}", column_digest));
    }

    format!("{:x}", Md5::digest(concatenated.as_bytes())).into_bytes()
}
