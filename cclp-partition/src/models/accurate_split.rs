//! Split of one subset into two children minimizing the larger child cost.
//!
//! Each child's cost is bounded through the LP dual of its deterministic
//! problem over the unit box,
//!
//! ```text
//! min  sum_j lambda_{n+j} + sum_s b_s eta_s
//! s.t. -lambda_j + lambda_{n+j} + sum_s A_s[:, j] eta_s = c_j
//!      lambda, eta >= 0
//! ```
//!
//! and binary assignments `pi` switch the duals of the scenarios a child does
//! not receive off. The objective bounds the cost of the costlier child.

use cclp_core::{
    ChanceInstance, Cmp, LinearModel, Oracle, OracleStatus, ScenarioSet, Sense, SolveParams,
    VarId, VarSpec,
};

use crate::error::{PartitionError, PartitionResult};

/// Result of the accurate split of one subset.
#[derive(Debug, Clone, PartialEq)]
pub struct AccurateSplit {
    /// Bound on the larger child cost.
    pub cost: f64,
    /// Scenarios kept in place.
    pub left: Vec<usize>,
    /// Scenarios moved to the new subset.
    pub right: Vec<usize>,
}

/// Dual variables of one child.
#[derive(Debug, Clone)]
struct Side {
    pi: Vec<VarId>,
    lambda: Vec<VarId>,
    eta: Vec<Vec<VarId>>,
}

/// Assignment model for splitting `scenarios` in two.
#[derive(Debug, Clone)]
pub struct AccurateSplitModel {
    model: LinearModel,
    scenarios: Vec<usize>,
    left: Vec<VarId>,
}

impl AccurateSplitModel {
    /// Build the split model; both children receive at least one of
    /// `infeasible`.
    pub fn build(instance: &ChanceInstance, scenarios: &[usize], infeasible: &[usize]) -> Self {
        let n = instance.nb_vars();
        let m = instance.nb_constraints();
        let dual_bound = Self::dual_bound(instance, scenarios);

        let mut model = LinearModel::new("accurate_split", Sense::Minimize);
        let alpha = model.add_var(VarSpec::continuous("alpha", f64::NEG_INFINITY, f64::INFINITY));
        model.set_objective(Sense::Minimize, vec![(alpha, 1.0)], 0.0);

        let mut sides = Vec::with_capacity(2);
        for label in ["left", "right"] {
            let pi = model.add_vars(&format!("{label}_pi"), scenarios.len(), VarSpec::binary);
            let lambda = model.add_vars(&format!("{label}_lambda"), 2 * n, |name| {
                VarSpec::continuous(name, 0.0, f64::INFINITY)
            });
            let eta = (0..scenarios.len())
                .map(|k| {
                    model.add_vars(&format!("{label}_eta_{k}"), m, |name| {
                        VarSpec::continuous(name, 0.0, f64::INFINITY)
                    })
                })
                .collect();
            sides.push(Side { pi, lambda, eta });
        }

        for side in &sides {
            // alpha >= sum_j lambda_{n+j} + sum_s b_s eta_s
            let mut row = vec![(alpha, 1.0)];
            row.extend(side.lambda[n..].iter().map(|&l| (l, -1.0)));
            for (k, &s) in scenarios.iter().enumerate() {
                for i in 0..m {
                    let b = instance.rhs(s, i);
                    if b != 0.0 {
                        row.push((side.eta[k][i], -b));
                    }
                }
            }
            model.add_row(row, Cmp::Ge, 0.0);

            for j in 0..n {
                let mut row = vec![(side.lambda[j], -1.0), (side.lambda[n + j], 1.0)];
                for (k, &s) in scenarios.iter().enumerate() {
                    for i in 0..m {
                        let a = instance.row(s, i)[j];
                        if a != 0.0 {
                            row.push((side.eta[k][i], a));
                        }
                    }
                }
                model.add_row(row, Cmp::Eq, instance.cost()[j]);
            }

            // pi_s = 0 => eta_s = 0
            for (k, eta) in side.eta.iter().enumerate() {
                for &e in eta {
                    model.add_row(vec![(e, 1.0), (side.pi[k], -dual_bound)], Cmp::Le, 0.0);
                }
            }

            let at_least_one = scenarios
                .iter()
                .zip(&side.pi)
                .filter(|(s, _)| infeasible.contains(s))
                .map(|(_, &p)| (p, 1.0))
                .collect();
            model.add_row(at_least_one, Cmp::Ge, 1.0);
        }

        for k in 0..scenarios.len() {
            model.add_row(
                vec![(sides[0].pi[k], 1.0), (sides[1].pi[k], 1.0)],
                Cmp::Eq,
                1.0,
            );
        }

        let left = sides.swap_remove(0).pi;
        Self {
            model,
            scenarios: scenarios.to_vec(),
            left,
        }
    }

    /// Bound on the scenario duals used to switch them off.
    ///
    /// Any non-negative value keeps the model feasible (`eta = 0` is always
    /// completed by `lambda`), and the objective stays an upper bound on the
    /// costlier child. The value is approximate: when an optimal child dual
    /// exceeds it, the predicted cost over-estimates that child and the
    /// chosen assignment may differ from one with exact indicator rows.
    fn dual_bound(instance: &ChanceInstance, scenarios: &[usize]) -> f64 {
        let cost: f64 = instance.cost().iter().map(|c| c.abs()).sum();
        let smallest = scenarios
            .iter()
            .flat_map(|&s| instance.matrix(s).iter())
            .map(|a| a.abs())
            .filter(|&a| a > 0.0)
            .fold(f64::INFINITY, f64::min);
        if smallest.is_finite() {
            (cost / smallest).max(1.0)
        } else {
            cost.max(1.0)
        }
    }

    /// Solve and read the two children.
    ///
    /// `None` when the time limit stopped the oracle before any assignment.
    pub fn solve(&self, oracle: &dyn Oracle, params: &SolveParams) -> PartitionResult<Option<AccurateSplit>> {
        let sol = oracle.solve(&self.model, params)?;
        if sol.status == OracleStatus::TimeLimit && !sol.has_solution() {
            return Ok(None);
        }
        if !sol.has_solution() {
            return Err(PartitionError::oracle(self.model.name(), format!("{:?}", sol.status)));
        }
        if sol.status != OracleStatus::Optimal {
            log::warn!("accurate split stopped early with status {:?}", sol.status);
        }
        let (left, right): (Vec<_>, Vec<_>) = self
            .scenarios
            .iter()
            .zip(&self.left)
            .partition(|(_, pi)| sol.x[pi.index()] >= 0.5);
        Ok(Some(AccurateSplit {
            cost: sol.obj_val,
            left: left.into_iter().map(|(&s, _)| s).collect(),
            right: right.into_iter().map(|(&s, _)| s).collect(),
        }))
    }
}
