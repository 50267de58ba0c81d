//! Error types for the verification library.

use thiserror::Error;

/// Main error type for verifier operations.
///
/// Verification *failure* (rows that genuinely differ at cutover) is not an
/// error; it is carried in [`crate::VerificationResult`] so callers can
/// render it. Errors here mean the verifier could not finish its job.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Bad options or a missing/inconsistent collaborator.
    #[error("configuration error: {0}")]
    Config(String),

    /// Phase methods called out of order.
    #[error("sequencing error: {0}")]
    Sequencing(String),

    /// Fingerprint fetch failed (connect, prepare, execute, or scan),
    /// after the retry policy is exhausted.
    #[error("fingerprint fetch failed: {0}")]
    Fetch(String),

    /// Pagination failure from the cursor collaborator.
    #[error("cursor error: {0}")]
    Cursor(String),

    /// A change event did not yield a recoverable primary key.
    #[error("could not extract pk from change event: {0}")]
    PkExtract(String),

    /// An upstream invariant was violated, e.g. a change event arriving
    /// after cutover started.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl VerifyError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        VerifyError::Config(message.into())
    }

    /// Create a Sequencing error.
    pub fn sequencing(message: impl Into<String>) -> Self {
        VerifyError::Sequencing(message.into())
    }

    /// Create a Fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        VerifyError::Fetch(message.into())
    }

    /// Create a Cursor error.
    pub fn cursor(message: impl Into<String>) -> Self {
        VerifyError::Cursor(message.into())
    }

    /// Create a Protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        VerifyError::Protocol(message.into())
    }
}

/// Result type alias for verifier operations.
pub type Result<T> = std::result::Result<T, VerifyError>;
