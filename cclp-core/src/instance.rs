//! Chance-constrained instance data and scenario-level feasibility checks.
//!
//! The instance describes
//!
//! ```text
//! maximize    c^T x
//! subject to  P[ A_s x <= b_s ] >= 1 - epsilon
//!             lb <= x <= ub,  x_j integral for non-continuous j
//! ```
//!
//! with a finite set of scenarios `s`, each carrying its own constraint block.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::util::{dot, norm2, tolerance_count, FLOOR_GUARD};

/// Row violations at or below this threshold count as satisfied.
pub const VIOLATION_TOL: f64 = 1e-6;

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarType {
    /// Continuous variable
    Continuous,
    /// Integer variable
    Integer,
    /// Binary variable (0 or 1)
    Binary,
}

impl VarType {
    /// True for integer and binary variables.
    pub fn is_integral(self) -> bool {
        !matches!(self, VarType::Continuous)
    }
}

/// Read access to a collection of constraint blocks sharing one objective.
///
/// Implemented both by the scenario-level [`ChanceInstance`] and by the
/// subset-level [`crate::PartitionedView`], so optimization models can be
/// built over either.
pub trait ScenarioSet {
    /// Number of decision variables.
    fn nb_vars(&self) -> usize;

    /// Number of blocks (scenarios or subsets).
    fn nb_blocks(&self) -> usize;

    /// Number of rows in block `k`.
    fn nb_rows(&self, k: usize) -> usize;

    /// Coefficients of row `i` in block `k`.
    fn row(&self, k: usize, i: usize) -> &[f64];

    /// Right-hand side of row `i` in block `k`.
    fn rhs(&self, k: usize, i: usize) -> f64;

    /// Probability of every block.
    fn probabilities(&self) -> &[f64];

    /// Chance tolerance at this level.
    fn epsilon(&self) -> f64;

    /// Objective vector.
    fn cost(&self) -> &[f64];

    /// Variable domains.
    fn var_types(&self) -> &[VarType];

    /// Variable lower bounds.
    fn var_lb(&self) -> &[f64];

    /// Variable upper bounds.
    fn var_ub(&self) -> &[f64];

    /// True when every variable is continuous.
    fn is_continuous(&self) -> bool {
        self.var_types().iter().all(|t| !t.is_integral())
    }
}

/// Immutable chance-constrained instance.
#[derive(Debug, Clone)]
pub struct ChanceInstance {
    name: String,
    nb_vars: usize,
    nb_constraints: usize,
    nb_scenarios: usize,
    var_type: Vec<VarType>,
    var_lb: Vec<f64>,
    var_ub: Vec<f64>,
    /// Row-major `[scenario][constraint][var]`.
    a: Vec<f64>,
    /// Row-major `[scenario][constraint]`.
    b: Vec<f64>,
    c: Vec<f64>,
    proba: Vec<f64>,
    epsilon: f64,
}

/// Raw data used to build a [`ChanceInstance`].
#[derive(Debug, Clone)]
pub struct InstanceData {
    /// Display name (file stem for loaded instances).
    pub name: String,
    /// Objective vector, length `n`.
    pub c: Vec<f64>,
    /// One `m x n` matrix per scenario, as rows.
    pub a: Vec<Vec<Vec<f64>>>,
    /// One right-hand side per scenario, length `m`.
    pub b: Vec<Vec<f64>>,
    /// Scenario probabilities; uniform when `None`.
    pub proba: Option<Vec<f64>>,
    /// Variable domains, length `n`.
    pub var_type: Vec<VarType>,
    /// Lower bounds, length `n`.
    pub var_lb: Vec<f64>,
    /// Upper bounds, length `n`.
    pub var_ub: Vec<f64>,
    /// Chance tolerance in (0, 1).
    pub epsilon: f64,
}

impl InstanceData {
    /// Knapsack-style data on the unit box: continuous `[0,1]` or binary
    /// variables, uniform probabilities.
    pub fn unit_box(
        name: impl Into<String>,
        c: Vec<f64>,
        a: Vec<Vec<Vec<f64>>>,
        b: Vec<Vec<f64>>,
        continuous: bool,
        epsilon: f64,
    ) -> Self {
        let n = c.len();
        let var_type = if continuous {
            VarType::Continuous
        } else {
            VarType::Binary
        };
        Self {
            name: name.into(),
            c,
            a,
            b,
            proba: None,
            var_type: vec![var_type; n],
            var_lb: vec![0.0; n],
            var_ub: vec![1.0; n],
            epsilon,
        }
    }
}

impl ChanceInstance {
    /// Validate and flatten instance data.
    pub fn new(data: InstanceData) -> CoreResult<Self> {
        let nb_vars = data.c.len();
        let nb_scenarios = data.a.len();
        if nb_vars == 0 {
            return Err(CoreError::InvalidInstance("no decision variables".into()));
        }
        if nb_scenarios == 0 {
            return Err(CoreError::InvalidInstance("no scenarios".into()));
        }
        if data.b.len() != nb_scenarios {
            return Err(CoreError::InvalidInstance(format!(
                "{} right-hand sides for {} scenarios",
                data.b.len(),
                nb_scenarios
            )));
        }
        if !(data.epsilon > 0.0 && data.epsilon < 1.0) {
            return Err(CoreError::InvalidInstance(format!(
                "epsilon must lie in (0, 1), got {}",
                data.epsilon
            )));
        }
        for (label, len) in [
            ("var_type", data.var_type.len()),
            ("var_lb", data.var_lb.len()),
            ("var_ub", data.var_ub.len()),
        ] {
            if len != nb_vars {
                return Err(CoreError::InvalidInstance(format!(
                    "{label} has length {len}, expected {nb_vars}"
                )));
            }
        }
        if let Some(j) = (0..nb_vars).find(|&j| data.var_lb[j] > data.var_ub[j]) {
            return Err(CoreError::InvalidInstance(format!(
                "variable {j} has lb {} > ub {}",
                data.var_lb[j], data.var_ub[j]
            )));
        }

        let nb_constraints = data.a[0].len();
        let mut a = Vec::with_capacity(nb_scenarios * nb_constraints * nb_vars);
        let mut b = Vec::with_capacity(nb_scenarios * nb_constraints);
        for (s, (rows, rhs)) in data.a.iter().zip(&data.b).enumerate() {
            if rows.len() != nb_constraints || rhs.len() != nb_constraints {
                return Err(CoreError::InvalidInstance(format!(
                    "scenario {s} has {} rows and {} rhs entries, expected {nb_constraints}",
                    rows.len(),
                    rhs.len()
                )));
            }
            for (i, row) in rows.iter().enumerate() {
                if row.len() != nb_vars {
                    return Err(CoreError::InvalidInstance(format!(
                        "row {i} of scenario {s} has {} coefficients, expected {nb_vars}",
                        row.len()
                    )));
                }
                a.extend_from_slice(row);
            }
            b.extend_from_slice(rhs);
        }

        let proba = match data.proba {
            Some(p) => {
                if p.len() != nb_scenarios {
                    return Err(CoreError::InvalidInstance(format!(
                        "{} probabilities for {nb_scenarios} scenarios",
                        p.len()
                    )));
                }
                let total: f64 = p.iter().sum();
                if p.iter().any(|&v| v < 0.0) || (total - 1.0).abs() > 1e-6 {
                    return Err(CoreError::InvalidInstance(format!(
                        "probabilities must be non-negative and sum to 1 (sum = {total})"
                    )));
                }
                p
            }
            None => vec![1.0 / nb_scenarios as f64; nb_scenarios],
        };

        Ok(Self {
            name: data.name,
            nb_vars,
            nb_constraints,
            nb_scenarios,
            var_type: data.var_type,
            var_lb: data.var_lb,
            var_ub: data.var_ub,
            a,
            b,
            c: data.c,
            proba,
            epsilon: data.epsilon,
        })
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of scenarios.
    pub fn nb_scenarios(&self) -> usize {
        self.nb_scenarios
    }

    /// Number of constraints in every scenario.
    pub fn nb_constraints(&self) -> usize {
        self.nb_constraints
    }

    /// Constraint matrix of scenario `s`, row-major.
    pub fn matrix(&self, s: usize) -> &[f64] {
        let len = self.nb_constraints * self.nb_vars;
        &self.a[s * len..(s + 1) * len]
    }

    /// Right-hand side of scenario `s`.
    pub fn rhs_vector(&self, s: usize) -> &[f64] {
        &self.b[s * self.nb_constraints..(s + 1) * self.nb_constraints]
    }

    /// `floor(epsilon * N)`: how many scenarios may be violated.
    pub fn tolerance_count(&self) -> usize {
        tolerance_count(self.epsilon, self.nb_scenarios)
    }

    /// Fewest subsets a partition may have.
    pub fn minimum_partition_size(&self) -> usize {
        self.tolerance_count() + 1
    }

    /// Objective value `c^T x`.
    pub fn objective(&self, x: &[f64]) -> f64 {
        dot(&self.c, x)
    }

    /// Maximum rescaled violation of scenario `s` at `x`, zero if satisfied.
    pub fn scenario_violation(&self, s: usize, x: &[f64]) -> f64 {
        let mut worst = 0.0_f64;
        for i in 0..self.nb_constraints {
            let row = self.row(s, i);
            let violation = dot(row, x) - self.rhs(s, i);
            if violation > VIOLATION_TOL {
                let norm = norm2(row);
                let rescaled = if norm != 0.0 { violation / norm } else { violation };
                worst = worst.max(rescaled);
            }
        }
        worst
    }

    /// Evaluate `x` against every scenario.
    pub fn evaluate(&self, x: &[f64]) -> FeasibilityReport {
        let max_violation: Vec<f64> = (0..self.nb_scenarios)
            .map(|s| self.scenario_violation(s, x))
            .collect();
        let infeasible: Vec<usize> = max_violation
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.0)
            .map(|(s, _)| s)
            .collect();
        let tolerance = self.epsilon * self.nb_scenarios as f64;
        FeasibilityReport {
            is_feasible: infeasible.len() as f64 <= tolerance + FLOOR_GUARD,
            tolerance,
            infeasible,
            max_violation,
        }
    }

    /// Whether `x` is feasible for the chance-constrained problem.
    pub fn is_feasible(&self, x: &[f64]) -> bool {
        self.evaluate(x).is_feasible
    }
}

impl ScenarioSet for ChanceInstance {
    fn nb_vars(&self) -> usize {
        self.nb_vars
    }

    fn nb_blocks(&self) -> usize {
        self.nb_scenarios
    }

    fn nb_rows(&self, _k: usize) -> usize {
        self.nb_constraints
    }

    fn row(&self, k: usize, i: usize) -> &[f64] {
        let start = (k * self.nb_constraints + i) * self.nb_vars;
        &self.a[start..start + self.nb_vars]
    }

    fn rhs(&self, k: usize, i: usize) -> f64 {
        self.b[k * self.nb_constraints + i]
    }

    fn probabilities(&self) -> &[f64] {
        &self.proba
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn cost(&self) -> &[f64] {
        &self.c
    }

    fn var_types(&self) -> &[VarType] {
        &self.var_type
    }

    fn var_lb(&self) -> &[f64] {
        &self.var_lb
    }

    fn var_ub(&self) -> &[f64] {
        &self.var_ub
    }
}

/// Outcome of checking a point against every scenario.
#[derive(Debug, Clone)]
pub struct FeasibilityReport {
    /// `#infeasible <= epsilon * N`.
    pub is_feasible: bool,
    /// `epsilon * N`.
    pub tolerance: f64,
    /// Indices of violated scenarios, ascending.
    pub infeasible: Vec<usize>,
    /// Per-scenario maximum rescaled violation (zero when satisfied).
    pub max_violation: Vec<f64>,
}

impl FeasibilityReport {
    /// Number of violated scenarios.
    pub fn nb_infeasible(&self) -> usize {
        self.infeasible.len()
    }

    /// Whether scenario `s` is violated.
    pub fn is_scenario_infeasible(&self, s: usize) -> bool {
        self.max_violation[s] > 0.0
    }

    /// One flag per scenario, true when satisfied.
    pub fn feasible_scenarios(&self) -> Vec<bool> {
        self.max_violation.iter().map(|&v| v == 0.0).collect()
    }

    /// Sum of the per-scenario maximum violations.
    pub fn total_violation(&self) -> f64 {
        self.max_violation.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_scenarios() -> ChanceInstance {
        let data = InstanceData::unit_box(
            "tiny",
            vec![1.0, 1.0],
            vec![
                vec![vec![1.0, 1.0]],
                vec![vec![2.0, 0.0]],
            ],
            vec![vec![1.0], vec![1.0]],
            true,
            0.5,
        );
        ChanceInstance::new(data).unwrap()
    }

    #[test]
    fn test_uniform_probabilities_and_rows() {
        let inst = two_scenarios();
        assert_eq!(inst.probabilities(), &[0.5, 0.5]);
        assert_eq!(inst.row(1, 0), &[2.0, 0.0]);
        assert_eq!(inst.rhs(0, 0), 1.0);
        assert_eq!(inst.minimum_partition_size(), 2);
    }

    #[test]
    fn test_evaluate_counts_violated_scenarios() {
        let inst = two_scenarios();
        let report = inst.evaluate(&[1.0, 0.0]);
        assert_eq!(report.infeasible, vec![1]);
        assert!(report.is_feasible);
        assert!((report.max_violation[1] - 0.5).abs() < 1e-12);
        assert_eq!(report.feasible_scenarios(), vec![true, false]);

        let report = inst.evaluate(&[1.0, 1.0]);
        assert_eq!(report.nb_infeasible(), 2);
        assert!(!report.is_feasible);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let mut data = InstanceData::unit_box(
            "bad",
            vec![1.0, 1.0],
            vec![vec![vec![1.0, 1.0]], vec![vec![1.0]]],
            vec![vec![1.0], vec![1.0]],
            true,
            0.2,
        );
        assert!(matches!(
            ChanceInstance::new(data.clone()),
            Err(CoreError::InvalidInstance(_))
        ));
        data.a[1][0].push(0.0);
        data.epsilon = 1.5;
        assert!(ChanceInstance::new(data).is_err());
    }
}
