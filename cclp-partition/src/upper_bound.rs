//! Upper bounds: quantile bound, first-iteration bound and the partitioned
//! chance-constrained model.
//!
//! The partitioned model is a relaxation of the scenario model: requiring a
//! subset means requiring every member scenario, and the subset
//! probabilities are chosen so that every feasible scenario selection maps to
//! a feasible subset selection.

use cclp_core::util::argsort;
use cclp_core::{Oracle, OracleStatus, PartitionedView, SolveParams, TimeBudget};

use crate::big_m::BigMTable;
use crate::bounds::{BoundState, BOUND_TOL};
use crate::error::{PartitionError, PartitionResult};
use crate::evaluator::SubsetSolution;
use crate::models::CclpModel;

/// Slack on the probability mass of the quantile bound.
const QUANTILE_GUARD: f64 = 1e-7;

/// Subsets cheaper than the lower bound by this much are never selected.
const PRUNE_TOL: f64 = 1e-3;

/// Relative MIP gap of the partitioned model.
const PARTITION_GAP: f64 = 1e-8;

/// Solution of one upper-bounding step.
#[derive(Debug, Clone, PartialEq)]
pub struct UpperBound {
    /// Decision variables.
    pub x: Vec<f64>,
    /// Subset indicators.
    pub z: Vec<f64>,
    /// Objective of `x`.
    pub obj: f64,
    /// Proven bound.
    pub bound: f64,
}

/// Quantile bound of Ahmed et al.: the smallest scenario cost whose
/// cumulative probability, in ascending cost order, exceeds `epsilon`.
pub fn ahmed_bound(costs: &[f64], proba: &[f64], epsilon: f64) -> f64 {
    let mut mass = 0.0;
    for s in argsort(costs) {
        mass += proba[s];
        if mass >= epsilon + QUANTILE_GUARD {
            return costs[s];
        }
    }
    f64::INFINITY
}

/// Bound of a minimum-size partition: every feasible point satisfies one
/// subset, so none beats the costliest subset.
///
/// `None` while a subset cost is unknown.
pub fn first_iteration_bound(costs: &[SubsetSolution]) -> Option<UpperBound> {
    if !costs.iter().all(SubsetSolution::is_known) {
        return None;
    }
    let (best, sol) = costs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cost.total_cmp(&b.1.cost))?;
    let mut z = vec![0.0; costs.len()];
    z[best] = 1.0;
    Some(UpperBound {
        x: sol.x.clone(),
        z,
        obj: sol.cost,
        bound: sol.cost,
    })
}

/// Builds and solves the partitioned chance-constrained model.
#[derive(Debug, Clone, Copy)]
pub struct UpperBounder {
    use_lazy: bool,
    continuous: bool,
}

impl UpperBounder {
    /// Bounder for an instance with (or without) integral variables.
    pub fn new(use_lazy: bool, continuous: bool) -> Self {
        Self {
            use_lazy,
            continuous,
        }
    }

    /// Model over the subsets of `view`, with big-M rows when a table is given.
    pub fn build(&self, view: &PartitionedView<'_>, big_m: Option<&BigMTable>) -> PartitionResult<CclpModel> {
        Ok(CclpModel::build(view, big_m, self.use_lazy)?)
    }

    /// Solve `model` within the remaining budget.
    ///
    /// Subsets whose cost falls below the lower bound are excluded first.
    /// Returns `None` when the budget ran out before a solution was found.
    pub fn solve(
        &self,
        mut model: CclpModel,
        costs: &[f64],
        bounds: &BoundState,
        oracle: &dyn Oracle,
        budget: &TimeBudget,
    ) -> PartitionResult<Option<UpperBound>> {
        let mut pruned = 0;
        for (c, &cost) in costs.iter().enumerate() {
            if cost <= bounds.lower - PRUNE_TOL {
                model.prune(c);
                pruned += 1;
            }
        }
        if pruned > 0 {
            log::debug!("Pruned {pruned} subsets below the lower bound");
        }

        let params = SolveParams::default()
            .with_mip_gap(PARTITION_GAP)
            .with_time_limit(budget.remaining());
        let sol = model.solve(oracle, &params)?;
        match sol.status {
            OracleStatus::Optimal | OracleStatus::TimeLimit if sol.has_solution() => {}
            OracleStatus::TimeLimit => return Ok(None),
            status => {
                return Err(PartitionError::oracle(model.model().name(), format!("{status:?}")))
            }
        }
        if self.continuous && sol.obj_val > bounds.upper + BOUND_TOL {
            return Err(PartitionError::UpperBoundIncreased {
                previous: bounds.upper,
                current: sol.obj_val,
            });
        }
        log::debug!(
            "Partitioned model: objective {:.6}, bound {:.6} in {:.3}s",
            sol.obj_val,
            sol.bound,
            sol.solve_time.as_secs_f64()
        );
        Ok(Some(UpperBound {
            x: sol.x,
            z: sol.z,
            obj: sol.obj_val,
            bound: sol.bound,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{ChanceInstance, GoodLpOracle, InstanceData, Partition};

    #[test]
    fn test_ahmed_bound() {
        let costs = [0.4, 0.1, 0.3, 0.2, 0.5];
        let proba = [0.2; 5];
        // Ascending: 0.1, 0.2 reach mass 0.4 > 0.3.
        assert!((ahmed_bound(&costs, &proba, 0.3) - 0.2).abs() < 1e-12);
        assert!((ahmed_bound(&costs, &proba, 0.2) - 0.2).abs() < 1e-12);
        assert!((ahmed_bound(&costs, &proba, 0.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_first_iteration_picks_costliest() {
        let costs = vec![
            SubsetSolution { cost: 0.3, x: vec![0.3] },
            SubsetSolution { cost: 0.6, x: vec![0.6] },
        ];
        let ub = first_iteration_bound(&costs).unwrap();
        assert_eq!(ub.z, vec![0.0, 1.0]);
        assert_eq!(ub.obj, 0.6);
        assert!(first_iteration_bound(&[]).is_none());
        assert!(first_iteration_bound(&[costs[0].clone(), SubsetSolution::unknown()]).is_none());
    }

    #[test]
    fn test_partitioned_model_relaxes_scenarios() {
        // Six scenarios capping x at 0.1 .. 0.6, one may be violated.
        let a = vec![vec![vec![1.0]]; 6];
        let b = (0..6).map(|s| vec![0.1 * (s + 1) as f64]).collect();
        let inst = ChanceInstance::new(InstanceData::unit_box("ub", vec![1.0], a, b, true, 0.2)).unwrap();
        let part = Partition::from_subsets(vec![vec![0, 5], vec![1, 4], vec![2, 3]]);
        let view = PartitionedView::new(&inst, &part);
        let bounder = UpperBounder::new(false, true);
        let ub = bounder
            .solve(
                bounder.build(&view, None).unwrap(),
                &[0.1, 0.2, 0.3],
                &BoundState::default(),
                &GoodLpOracle::new(),
                &TimeBudget::unlimited(),
            )
            .unwrap()
            .unwrap();
        // Dropping subset {0, 5} leaves x <= 0.2, the scenario optimum.
        assert!((ub.obj - 0.2).abs() < 1e-6);
        assert!(ub.z[0] < 0.5);
    }
}
