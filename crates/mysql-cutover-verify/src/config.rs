//! Verifier options.
//!
//! Plain data only; collaborators (database handles, cursor factory, change
//! stream, schema cache) are constructor arguments on
//! [`crate::IterativeVerifier`], never deserialized.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, VerifyError};

/// Cursor paging configuration.
///
/// `batch_size` doubles as the reverify batch size at cutover, so one knob
/// controls both the scan page and the cutover chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorConfig {
    /// Rows per cursor page and PKs per reverify batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    200
}

fn default_concurrency() -> usize {
    4
}

/// Options for one verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierOptions {
    /// Worker-pool width for the table scan and the cutover reverification.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Cursor paging configuration.
    #[serde(default)]
    pub cursor: CursorConfig,

    /// Bare table names whose change events are dropped.
    #[serde(default)]
    pub ignored_tables: Vec<String>,

    /// Source-to-target schema-name remapping. Missing keys mean the
    /// schema keeps its name on the target.
    #[serde(default)]
    pub database_rewrites: HashMap<String, String>,

    /// Source-to-target table-name remapping. Missing keys mean the table
    /// keeps its name on the target.
    #[serde(default)]
    pub table_rewrites: HashMap<String, String>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cursor: CursorConfig::default(),
            ignored_tables: Vec::new(),
            database_rewrites: HashMap::new(),
            table_rewrites: HashMap::new(),
        }
    }
}

impl VerifierOptions {
    /// Validate option values. Called from `initialize`.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(VerifyError::config(
                "verifier concurrency must be greater than 0",
            ));
        }

        if self.cursor.batch_size == 0 {
            return Err(VerifyError::config(
                "cursor batch size must be greater than 0",
            ));
        }

        Ok(())
    }
}
