//! Error types for the partitioning algorithm.

use cclp_core::CoreError;
use thiserror::Error;

/// Errors that can occur while solving a chance-constrained program.
#[derive(Error, Debug)]
pub enum PartitionError {
    /// Invalid or inconsistent settings
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A partition produced by the algorithm broke its invariants
    #[error("Partition check failed: {0}")]
    PartitionCheck(String),

    /// More subsets are infeasible than the tolerance allows
    #[error("Cannot refine: {nb_infeasible} infeasible subsets exceed the tolerance of {tolerance}")]
    NoSplitRequired {
        /// Infeasible subsets in the current partition.
        nb_infeasible: usize,
        /// Number of scenarios that may be violated.
        tolerance: usize,
    },

    /// Ran out of splittable subsets
    #[error("Performed {done} of {required} splits: no subset left with two infeasible scenarios")]
    NotEnoughSplits {
        /// Splits performed.
        done: usize,
        /// Splits required.
        required: usize,
    },

    /// Merging preconditions do not hold
    #[error("Cannot merge: {0}")]
    Merge(String),

    /// The partitioned problem returned a worse upper bound
    #[error("Upper bound increased from {previous} to {current}")]
    UpperBoundIncreased {
        /// Best upper bound so far.
        previous: f64,
        /// Objective of the new solution.
        current: f64,
    },

    /// An oracle solve ended without a usable answer
    #[error("Oracle failed on {model}: {reason}")]
    Oracle {
        /// Name of the model.
        model: String,
        /// Status or message.
        reason: String,
    },

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl PartitionError {
    pub(crate) fn oracle(model: &str, reason: impl std::fmt::Display) -> Self {
        PartitionError::Oracle {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for partitioning operations.
pub type PartitionResult<T> = Result<T, PartitionError>;
