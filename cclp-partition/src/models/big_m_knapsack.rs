//! Maximum violation of one row over solutions whose objective is bounded.

use cclp_core::{
    Cmp, CoreResult, LinearModel, Oracle, OracleStatus, ScenarioSet, Sense, SolveParams, VarId,
};

use super::{decision_vars, terms};

/// `max a x - b  s.t.  c x <= vUB, x in X`, with the row swapped per query.
#[derive(Debug, Clone)]
pub struct BigMKnapsackModel {
    model: LinearModel,
    x: Vec<VarId>,
}

impl BigMKnapsackModel {
    /// Build over the domain and objective of `set`. An infinite `upper_bound`
    /// leaves the objective unconstrained.
    pub fn new<S: ScenarioSet + ?Sized>(set: &S, upper_bound: f64) -> Self {
        let mut model = LinearModel::new("big_m_knapsack", Sense::Maximize);
        let x = decision_vars(&mut model, set);
        if upper_bound.is_finite() {
            model.add_row(terms(&x, set.cost()), Cmp::Le, upper_bound);
        }
        Self { model, x }
    }

    /// Largest `row x - rhs` the oracle can certify, using its best bound.
    ///
    /// Returns `None` when the oracle could not bound the violation.
    pub fn max_violation(
        &mut self,
        row: &[f64],
        rhs: f64,
        oracle: &dyn Oracle,
        params: &SolveParams,
    ) -> CoreResult<Option<f64>> {
        self.model
            .set_objective(Sense::Maximize, terms(&self.x, row), -rhs);
        let sol = oracle.solve(&self.model, params)?;
        Ok(match sol.status {
            OracleStatus::Optimal | OracleStatus::TimeLimit if sol.bound.is_finite() => {
                Some(sol.bound)
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{ChanceInstance, GoodLpOracle, InstanceData};

    #[test]
    fn test_binary_violation_respects_objective_bound() {
        let inst = ChanceInstance::new(InstanceData::unit_box(
            "knap",
            vec![3.0, 2.0, 2.0],
            vec![vec![vec![1.0, 1.0, 1.0]]],
            vec![vec![1.0]],
            false,
            0.5,
        ))
        .unwrap();
        let oracle = GoodLpOracle::new();
        let params = SolveParams::default().with_mip_gap(1e-8);

        let mut bounded = BigMKnapsackModel::new(&inst, 4.0);
        let m = bounded
            .max_violation(&[1.0, 4.0, 4.0], 1.0, &oracle, &params)
            .unwrap()
            .unwrap();
        // x = (0, 1, 1) has cost 4 and violation 8 - 1.
        assert!((m - 7.0).abs() < 1e-6);

        let mut free = BigMKnapsackModel::new(&inst, f64::INFINITY);
        let m = free
            .max_violation(&[1.0, 4.0, 4.0], 1.0, &oracle, &params)
            .unwrap()
            .unwrap();
        assert!((m - 8.0).abs() < 1e-6);
    }
}
