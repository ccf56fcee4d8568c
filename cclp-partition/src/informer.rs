//! Iteration progress: log lines and the append-only record table.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bounds::BoundState;
use crate::settings::{InitialPartition, ProjectionMethod, SplitMethod};

/// One row per bounding step.
///
/// Bounds are stored negated, as costs of the equivalent minimization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Iteration number, starting at 1.
    pub iteration: usize,
    /// Seconds since the start of the run.
    pub elapsed: f64,
    /// `-vLB`.
    pub neg_lower: f64,
    /// `-vUB`.
    pub neg_upper: f64,
    /// Relative gap in percent.
    pub gap_percent: f64,
    /// Number of subsets.
    pub nb_subsets: usize,
}

/// Collects iteration records and logs progress.
#[derive(Debug, Clone, Default)]
pub struct Informer {
    records: Vec<IterationRecord>,
}

impl Informer {
    /// Empty informer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the header of iteration `iteration`.
    pub fn log_iteration(&self, iteration: usize, bounds: &BoundState, elapsed: Duration) {
        log::info!(
            "iter {iteration:>4} | vUB {:>12.6} | vLB {:>12.6} | gap {:>9.4}% | {:>8.2}s",
            bounds.upper,
            bounds.lower,
            100.0 * bounds.gap(),
            elapsed.as_secs_f64()
        );
    }

    /// Append a record of the current state.
    pub fn store(&mut self, iteration: usize, elapsed: Duration, bounds: &BoundState, nb_subsets: usize) {
        self.records.push(IterationRecord {
            iteration,
            elapsed: elapsed.as_secs_f64(),
            neg_lower: -bounds.lower,
            neg_upper: -bounds.upper,
            gap_percent: 100.0 * bounds.gap(),
            nb_subsets,
        });
    }

    /// Records so far.
    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    /// Take the records out.
    pub fn into_records(self) -> Vec<IterationRecord> {
        self.records
    }
}

fn code(cost_like: bool) -> u8 {
    if cost_like {
        5
    } else {
        1
    }
}

/// Numeric codes `(split, initial partition, projection)` written in run rows.
pub fn method_codes(
    split: SplitMethod,
    initial: InitialPartition,
    projection: ProjectionMethod,
) -> (u8, u8, u8) {
    (
        code(split == SplitMethod::Cost),
        code(initial == InitialPartition::Cost),
        code(projection == ProjectionMethod::RescaledMaxViolation),
    )
}
