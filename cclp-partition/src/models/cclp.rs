//! Chance-constrained model with one indicator per block.
//!
//! ```text
//! maximize    c x
//! subject to  A_k x <= b_k + M_k (1 - z_k)     (or z_k = 1 => A_k x <= b_k)
//!             sum_k p_k z_k >= 1 - epsilon
//!             z binary
//! ```

use std::time::Duration;

use cclp_core::util::FLOOR_GUARD;
use cclp_core::{
    BoundSample, Cmp, CoreResult, LinearModel, Oracle, OracleStatus, ScenarioSet, Sense,
    SolveParams, VarId, VarSpec,
};

use super::{decision_vars, terms};
use crate::big_m::BigMTable;

/// Big-M values below this mark a row that no solution within the bound can
/// violate.
const DOMINATED_M: f64 = -1e-6;

/// Solution of a [`CclpModel`].
#[derive(Debug, Clone)]
pub struct CclpSolution {
    /// Oracle status.
    pub status: OracleStatus,
    /// Decision variables (empty without a solution).
    pub x: Vec<f64>,
    /// Indicators (empty without a solution).
    pub z: Vec<f64>,
    /// Objective of `x`.
    pub obj_val: f64,
    /// Best proven bound.
    pub bound: f64,
    /// Oracle wall time.
    pub solve_time: Duration,
    /// Bound trace, when requested.
    pub trace: Vec<BoundSample>,
}

impl CclpSolution {
    /// Returns true if a primal solution is attached.
    pub fn has_solution(&self) -> bool {
        !self.x.is_empty()
    }
}

/// Chance-constrained model over the blocks of a [`ScenarioSet`].
#[derive(Debug, Clone)]
pub struct CclpModel {
    model: LinearModel,
    x: Vec<VarId>,
    z: Vec<VarId>,
    nb_dominated: usize,
}

impl CclpModel {
    /// Build the model. Without a big-M table, rows are native indicator rows.
    pub fn build<S: ScenarioSet + ?Sized>(
        set: &S,
        big_m: Option<&BigMTable>,
        use_lazy: bool,
    ) -> CoreResult<Self> {
        let mut model = LinearModel::new("cclp", Sense::Maximize);
        let x = decision_vars(&mut model, set);
        model.set_objective(Sense::Maximize, terms(&x, set.cost()), 0.0);
        let z = model.add_vars("z", set.nb_blocks(), VarSpec::binary);
        let continuous = set.is_continuous();

        let mut nb_dominated = 0;
        for (k, &zk) in z.iter().enumerate() {
            for i in 0..set.nb_rows(k) {
                let row = terms(&x, set.row(k, i));
                let rhs = set.rhs(k, i);
                let Some(table) = big_m else {
                    model.add_indicator(zk, row, Cmp::Le, rhs)?;
                    continue;
                };
                let m = table.block(k)[i];
                let handle = if m >= DOMINATED_M {
                    let mut row = row;
                    row.push((zk, m));
                    Some(model.add_row(row, Cmp::Le, rhs + m))
                } else {
                    nb_dominated += 1;
                    if continuous {
                        None
                    } else {
                        Some(model.add_row(row, Cmp::Le, rhs + m))
                    }
                };
                if let (Some(handle), true) = (handle, use_lazy) {
                    model.set_lazy(handle);
                }
            }
        }
        if big_m.is_some() && nb_dominated > 0 {
            if continuous {
                log::info!("Skipped {nb_dominated} rows thanks to negative big-M values");
            } else {
                log::info!("Set up {nb_dominated} rows without indicator thanks to negative big-M values");
            }
        }

        let chance = z
            .iter()
            .zip(set.probabilities())
            .map(|(&zk, &p)| (zk, p))
            .collect();
        model.add_row(chance, Cmp::Ge, 1.0 - set.epsilon() - FLOOR_GUARD);

        Ok(Self {
            model,
            x,
            z,
            nb_dominated,
        })
    }

    /// Hint `z_k = 1` for the given blocks.
    pub fn warm_start(&mut self, selected: &[usize]) {
        for &k in selected {
            if let Some(&zk) = self.z.get(k) {
                self.model.set_hint(zk, 1.0);
            }
        }
    }

    /// Exclude block `k` from the satisfied set.
    pub fn prune(&mut self, k: usize) {
        self.model.fix_var(self.z[k], 0.0);
    }

    /// Rows whose big-M was negative.
    pub fn nb_dominated_rows(&self) -> usize {
        self.nb_dominated
    }

    /// Underlying linear model.
    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Solve with `oracle`.
    pub fn solve(&self, oracle: &dyn Oracle, params: &SolveParams) -> CoreResult<CclpSolution> {
        let sol = oracle.solve(&self.model, params)?;
        let (x, z) = if sol.has_solution() {
            (
                self.x.iter().map(|v| sol.x[v.index()]).collect(),
                self.z.iter().map(|v| sol.x[v.index()]).collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(CclpSolution {
            status: sol.status,
            x,
            z,
            obj_val: sol.obj_val,
            bound: sol.bound,
            solve_time: sol.solve_time,
            trace: sol.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{ChanceInstance, GoodLpOracle, InstanceData};

    /// Three scenarios capping x at 0.2, 0.5 and 0.8; one may be violated.
    fn instance(continuous: bool) -> ChanceInstance {
        let a = vec![vec![vec![1.0]]; 3];
        let b = vec![vec![0.2], vec![0.5], vec![0.8]];
        ChanceInstance::new(InstanceData::unit_box("cclp", vec![1.0], a, b, continuous, 0.34))
            .unwrap()
    }

    #[test]
    fn test_indicator_and_big_m_agree() {
        let inst = instance(true);
        let oracle = GoodLpOracle::new();
        let params = SolveParams::default();
        let native = CclpModel::build(&inst, None, false)
            .unwrap()
            .solve(&oracle, &params)
            .unwrap();
        assert!((native.obj_val - 0.5).abs() < 1e-6);

        let table = BigMTable::from_blocks(vec![vec![0.8], vec![0.5], vec![0.2]]);
        let big_m = CclpModel::build(&inst, Some(&table), true)
            .unwrap()
            .solve(&oracle, &params)
            .unwrap();
        assert!((big_m.obj_val - 0.5).abs() < 1e-6);
        assert_eq!(big_m.z.len(), 3);
        assert!(big_m.z[0] < 0.5);
    }

    #[test]
    fn test_negative_big_m_rows() {
        let table = BigMTable::from_blocks(vec![vec![0.8], vec![0.5], vec![-0.1]]);
        let continuous = CclpModel::build(&instance(true), Some(&table), false).unwrap();
        assert_eq!(continuous.nb_dominated_rows(), 1);
        assert_eq!(continuous.model().nb_rows(), 3);
        let binary = CclpModel::build(&instance(false), Some(&table), false).unwrap();
        assert_eq!(binary.model().nb_rows(), 4);
    }

    #[test]
    fn test_pruned_block_cannot_be_selected() {
        let inst = instance(true);
        let mut model = CclpModel::build(&inst, None, false).unwrap();
        model.prune(1);
        let sol = model
            .solve(&GoodLpOracle::new(), &SolveParams::default())
            .unwrap();
        assert!((sol.obj_val - 0.2).abs() < 1e-6);
        assert!(sol.z[1] < 0.5);
    }
}
