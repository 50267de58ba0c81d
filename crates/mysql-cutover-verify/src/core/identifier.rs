//! Identifier validation and quoting for dynamic SQL.
//!
//! SQL identifiers (schema, table, and column names) cannot be passed as
//! parameters in prepared statements - only data values can be. The
//! fingerprint query therefore interpolates identifiers, and every
//! interpolation goes through this module: validate first, then apply
//! MySQL backtick quoting with escaping.

use crate::error::{Result, VerifyError};

/// Maximum identifier length accepted (MySQL allows 64 characters).
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier before it is interpolated into SQL.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VerifyError::config("identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(VerifyError::config(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(VerifyError::config(format!(
            "identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// Escapes backticks by doubling them and wraps in backticks.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Qualify a MySQL table name with its schema.
///
/// Returns `` `schema`.`table` `` with proper quoting.
pub fn qualify_mysql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mysql(schema)?, quote_mysql(table)?))
}
