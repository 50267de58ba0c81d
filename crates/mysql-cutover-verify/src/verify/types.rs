//! Verification outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of a verification phase.
///
/// `data_correct == false` is not an error: it is the verifier doing its
/// job and reporting divergent rows. Genuine failures (connectivity,
/// protocol violations) surface as [`crate::VerifyError`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether every checked row matched.
    pub data_correct: bool,
    /// Human-readable description of the mismatches when `data_correct`
    /// is false; empty otherwise.
    pub message: String,
}

impl VerificationResult {
    /// A clean result: no mismatches.
    pub fn correct() -> Self {
        Self {
            data_correct: true,
            message: String::new(),
        }
    }

    /// A failed result naming the table and the offending PKs.
    pub fn failed(table: impl fmt::Display, mut mismatched_pks: Vec<u64>) -> Self {
        mismatched_pks.sort_unstable();
        let pks = mismatched_pks
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        Self {
            data_correct: false,
            message: format!("verification failed on table: {} for pks: {}", table, pks),
        }
    }
}

/// A verification result plus the timestamps external observers need.
///
/// The zero value (`Default`) represents a verification that has not
/// started yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationResultAndStatus {
    /// The result, once the run finished.
    pub result: Option<VerificationResult>,
    /// When the background run started.
    pub start_time: Option<DateTime<Utc>>,
    /// When the background run finished.
    pub done_time: Option<DateTime<Utc>>,
}

impl VerificationResultAndStatus {
    /// Whether the background verification has started.
    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    /// Whether the background verification has finished.
    pub fn is_done(&self) -> bool {
        self.done_time.is_some()
    }
}
