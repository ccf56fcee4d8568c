//! Error types for the chance-constrained data model.

use thiserror::Error;

/// Errors raised while building instances, partitions and models, or while
/// talking to the optimization oracle.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Instance data failed validation.
    #[error("Invalid instance: {0}")]
    InvalidInstance(String),

    /// A partition violates the cover/disjointness/size invariants.
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    /// The instance file could not be parsed.
    #[error("Parse error at line {line}: {msg}")]
    Parse {
        /// 1-based line number in the instance file.
        line: usize,
        /// What went wrong.
        msg: String,
    },

    /// A linear model was assembled inconsistently.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The oracle failed for a reason other than infeasibility or time.
    #[error("Oracle failed: {0}")]
    Oracle(String),

    /// I/O failure while reading an instance.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
