//! Oracle trait and result types.

use std::time::Duration;

use serde::Serialize;

use crate::error::CoreResult;
use crate::model::{LinearModel, Sense};

/// Status of an oracle solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OracleStatus {
    /// Solved to the requested gap.
    Optimal,

    /// Stopped by the time limit; a solution may or may not be attached.
    TimeLimit,

    /// Model is infeasible.
    Infeasible,

    /// Model is unbounded.
    Unbounded,
}

/// Parameters of one solve.
#[derive(Debug, Clone)]
pub struct SolveParams {
    /// Wall-clock limit (None = unlimited).
    pub time_limit: Option<Duration>,

    /// Relative MIP gap.
    pub mip_gap: f64,

    /// Thread count hint.
    pub threads: usize,

    /// Record (time, incumbent, bound) samples.
    pub record_trace: bool,

    /// Offset added to the time stamps of recorded samples.
    pub trace_offset: Duration,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            time_limit: None,
            mip_gap: 1e-4,
            threads: 1,
            record_trace: false,
            trace_offset: Duration::ZERO,
        }
    }
}

impl SolveParams {
    /// Set the time limit.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Set the relative MIP gap.
    pub fn with_mip_gap(mut self, gap: f64) -> Self {
        self.mip_gap = gap;
        self
    }

    /// Record the bound trace, stamping samples from `offset`.
    pub fn with_trace(mut self, offset: Duration) -> Self {
        self.record_trace = true;
        self.trace_offset = offset;
        self
    }
}

/// One (time, incumbent, bound) observation during a solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundSample {
    /// Seconds since the start of the run.
    pub elapsed: f64,
    /// Incumbent objective.
    pub incumbent: f64,
    /// Best bound.
    pub bound: f64,
}

/// Result of an oracle solve.
#[derive(Debug, Clone)]
pub struct OracleSolution {
    /// Solve status.
    pub status: OracleStatus,

    /// Primal values, empty when no solution is available.
    pub x: Vec<f64>,

    /// Objective of `x` (`-inf`/`+inf` for max/min without solution).
    pub obj_val: f64,

    /// Best proven bound on the optimum.
    pub bound: f64,

    /// Wall-clock time spent in the oracle.
    pub solve_time: Duration,

    /// Recorded bound samples.
    pub trace: Vec<BoundSample>,
}

impl OracleSolution {
    /// Result without a primal solution.
    pub fn without_solution(status: OracleStatus, sense: Sense) -> Self {
        let (obj_val, bound) = match sense {
            Sense::Maximize => (f64::NEG_INFINITY, f64::INFINITY),
            Sense::Minimize => (f64::INFINITY, f64::NEG_INFINITY),
        };
        Self {
            status,
            x: Vec::new(),
            obj_val,
            bound,
            solve_time: Duration::ZERO,
            trace: Vec::new(),
        }
    }

    /// Returns true if a primal solution is attached.
    pub fn has_solution(&self) -> bool {
        !self.x.is_empty() && matches!(self.status, OracleStatus::Optimal | OracleStatus::TimeLimit)
    }

    /// Returns true if optimality was proven.
    pub fn is_optimal(&self) -> bool {
        self.status == OracleStatus::Optimal
    }
}

/// Solver able to optimize a [`LinearModel`].
pub trait Oracle {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Solve `model` under `params`.
    ///
    /// Infeasibility, unboundedness and time limits are statuses, not errors;
    /// an error means the backend itself failed.
    fn solve(&self, model: &LinearModel, params: &SolveParams) -> CoreResult<OracleSolution>;
}
