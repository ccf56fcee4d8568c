//! Deterministic cost of scenario subsets.

use cclp_core::{ChanceInstance, Oracle, OracleStatus, Partition, SolveParams, TimeBudget};

use crate::error::{PartitionError, PartitionResult};
use crate::models::DeterministicModel;

/// Optimal objective and solution of the deterministic problem of a subset.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetSolution {
    /// Optimal objective; `+inf` when the time limit stopped the solve first.
    pub cost: f64,
    /// Optimal decision variables; empty when the cost is unknown.
    pub x: Vec<f64>,
}

impl SubsetSolution {
    /// Cost left unknown by the time limit. `+inf` still bounds the subset
    /// cost from above.
    pub fn unknown() -> Self {
        Self {
            cost: f64::INFINITY,
            x: Vec::new(),
        }
    }

    /// Whether the subset was solved.
    pub fn is_known(&self) -> bool {
        self.cost.is_finite()
    }
}

/// Solves deterministic problems over subsets of scenarios.
///
/// The cost of a subset is non-increasing as the subset grows, so every
/// subset cost bounds the optimum of the chance-constrained problem from
/// above whenever the subset must be satisfied.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    instance: &'a ChanceInstance,
    oracle: &'a dyn Oracle,
    budget: &'a TimeBudget,
}

impl<'a> Evaluator<'a> {
    /// Evaluator over `instance`; every solve gets the time left in `budget`.
    pub fn new(instance: &'a ChanceInstance, oracle: &'a dyn Oracle, budget: &'a TimeBudget) -> Self {
        Self {
            instance,
            oracle,
            budget,
        }
    }

    /// Instance being evaluated.
    pub fn instance(&self) -> &'a ChanceInstance {
        self.instance
    }

    /// Oracle used for every solve.
    pub fn oracle(&self) -> &'a dyn Oracle {
        self.oracle
    }

    /// Solve the deterministic problem with the rows of `subset`.
    ///
    /// Returns [`SubsetSolution::unknown`] once the budget is spent.
    pub fn subset_cost(&self, subset: &[usize]) -> PartitionResult<SubsetSolution> {
        if self.budget.is_exhausted() {
            return Ok(SubsetSolution::unknown());
        }
        let model = DeterministicModel::new(self.instance, subset);
        let params = SolveParams::default().with_time_limit(self.budget.remaining());
        let sol = model.solve(self.oracle, &params)?;
        if sol.status == OracleStatus::TimeLimit && !sol.has_solution() {
            log::debug!("Time limit reached before subset {subset:?} was solved");
            return Ok(SubsetSolution::unknown());
        }
        if !sol.has_solution() {
            return Err(PartitionError::oracle(
                model.model().name(),
                format!("subset {subset:?} ended with status {:?}", sol.status),
            ));
        }
        Ok(SubsetSolution {
            cost: sol.obj_val,
            x: sol.x,
        })
    }

    /// Cost of every single scenario.
    pub fn scenario_costs(&self) -> PartitionResult<Vec<SubsetSolution>> {
        (0..self.instance.nb_scenarios())
            .map(|s| self.subset_cost(&[s]))
            .collect()
    }

    /// Cost of every subset of `partition`.
    pub fn partition_cost(&self, partition: &Partition) -> PartitionResult<Vec<SubsetSolution>> {
        let costs = partition
            .iter()
            .map(|members| self.subset_cost(members))
            .collect::<PartitionResult<Vec<_>>>()?;
        log::debug!(
            "Evaluated {} subsets, costs {:?}",
            costs.len(),
            costs.iter().map(|c| c.cost).collect::<Vec<_>>()
        );
        Ok(costs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{GoodLpOracle, InstanceData};
    use std::time::Duration;

    fn instance() -> ChanceInstance {
        let a = vec![
            vec![vec![1.0, 1.0]],
            vec![vec![2.0, 1.0]],
            vec![vec![1.0, 4.0]],
        ];
        ChanceInstance::new(InstanceData::unit_box(
            "eval",
            vec![1.0, 1.0],
            a,
            vec![vec![1.0]; 3],
            true,
            0.34,
        ))
        .unwrap()
    }

    #[test]
    fn test_cost_decreases_as_subset_grows() {
        let inst = instance();
        let oracle = GoodLpOracle::new();
        let budget = TimeBudget::unlimited();
        let eval = Evaluator::new(&inst, &oracle, &budget);
        let mut previous = f64::INFINITY;
        for end in 1..=3 {
            let subset: Vec<usize> = (0..end).collect();
            let sol = eval.subset_cost(&subset).unwrap();
            assert!(sol.cost <= previous + 1e-9);
            assert_eq!(sol.x.len(), 2);
            previous = sol.cost;
        }
    }

    #[test]
    fn test_partition_and_scenario_costs() {
        let inst = instance();
        let oracle = GoodLpOracle::new();
        let budget = TimeBudget::unlimited();
        let eval = Evaluator::new(&inst, &oracle, &budget);
        let singles = eval.scenario_costs().unwrap();
        assert_eq!(singles.len(), 3);
        assert!((singles[0].cost - 1.0).abs() < 1e-6);

        let part = Partition::from_subsets(vec![vec![0], vec![1, 2]]);
        let costs = eval.partition_cost(&part).unwrap();
        assert_eq!(costs.len(), 2);
        assert!((costs[0].cost - singles[0].cost).abs() < 1e-9);
    }

    #[test]
    fn test_spent_budget_leaves_costs_unknown() {
        let inst = instance();
        let oracle = GoodLpOracle::new();
        let budget = TimeBudget::new(Duration::ZERO);
        let eval = Evaluator::new(&inst, &oracle, &budget);
        let costs = eval
            .partition_cost(&Partition::from_subsets(vec![vec![0], vec![1, 2]]))
            .unwrap();
        assert_eq!(costs, vec![SubsetSolution::unknown(); 2]);
        assert!(!costs[0].is_known());
    }
}
