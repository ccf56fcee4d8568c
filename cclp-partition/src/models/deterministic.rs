//! Deterministic model: maximize `c x` subject to every row of selected blocks.

use std::collections::BTreeMap;

use cclp_core::{
    Cmp, CoreResult, LinearModel, Oracle, OracleSolution, RowId, ScenarioSet, Sense, SolveParams,
    VarId,
};

use super::{decision_vars, terms};

/// Deterministic model whose blocks can be added and removed in place.
///
/// Row handles are kept per block so that a persistent instance can follow a
/// changing scenario selection without being rebuilt.
#[derive(Debug)]
pub struct DeterministicModel<'a, S: ScenarioSet + ?Sized> {
    set: &'a S,
    model: LinearModel,
    x: Vec<VarId>,
    blocks: BTreeMap<usize, Vec<RowId>>,
}

impl<'a, S: ScenarioSet + ?Sized> DeterministicModel<'a, S> {
    /// Model over `set` with the rows of `blocks`.
    pub fn new(set: &'a S, blocks: &[usize]) -> Self {
        let mut model = LinearModel::new("deterministic", Sense::Maximize);
        let x = decision_vars(&mut model, set);
        model.set_objective(Sense::Maximize, terms(&x, set.cost()), 0.0);
        let mut deter = Self {
            set,
            model,
            x,
            blocks: BTreeMap::new(),
        };
        deter.add(blocks);
        deter
    }

    /// Add the rows of `blocks`; blocks already present are skipped.
    pub fn add(&mut self, blocks: &[usize]) {
        for &k in blocks {
            if self.blocks.contains_key(&k) {
                continue;
            }
            let rows = (0..self.set.nb_rows(k))
                .map(|i| {
                    self.model.add_row(
                        terms(&self.x, self.set.row(k, i)),
                        Cmp::Le,
                        self.set.rhs(k, i),
                    )
                })
                .collect();
            self.blocks.insert(k, rows);
        }
    }

    /// Remove the rows of `blocks`; absent blocks are skipped.
    pub fn remove(&mut self, blocks: &[usize]) {
        for k in blocks {
            if let Some(rows) = self.blocks.remove(k) {
                for row in rows {
                    self.model.remove_row(row);
                }
            }
        }
    }

    /// Blocks currently in the model, ascending.
    pub fn blocks(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.keys().copied()
    }

    /// Add the cut `c x >= value`.
    pub fn add_objective_cut(&mut self, value: f64) -> RowId {
        let objective = self.model.objective().to_vec();
        self.model.add_row(objective, Cmp::Ge, value)
    }

    /// Remove a row added outside the blocks, such as an objective cut.
    pub fn remove_row(&mut self, row: RowId) -> bool {
        self.model.remove_row(row)
    }

    /// Underlying linear model.
    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Solve with `oracle`.
    pub fn solve(&self, oracle: &dyn Oracle, params: &SolveParams) -> CoreResult<OracleSolution> {
        oracle.solve(&self.model, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{ChanceInstance, GoodLpOracle, InstanceData};

    fn instance() -> ChanceInstance {
        let a = vec![
            vec![vec![1.0, 1.0]],
            vec![vec![2.0, 1.0]],
            vec![vec![1.0, 3.0]],
        ];
        let b = vec![vec![1.5]; 3];
        ChanceInstance::new(InstanceData::unit_box("deter", vec![1.0, 1.0], a, b, true, 0.34))
            .unwrap()
    }

    #[test]
    fn test_add_and_remove_blocks() {
        let inst = instance();
        let oracle = GoodLpOracle::new();
        let params = SolveParams::default();
        let mut deter = DeterministicModel::new(&inst, &[0]);
        let v0 = deter.solve(&oracle, &params).unwrap().obj_val;
        assert!((v0 - 1.5).abs() < 1e-6);

        deter.add(&[1, 2, 1]);
        assert_eq!(deter.blocks().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(deter.model().nb_rows(), 3);
        let v012 = deter.solve(&oracle, &params).unwrap().obj_val;
        assert!(v012 <= v0 + 1e-9);

        deter.remove(&[1, 2]);
        assert_eq!(deter.model().nb_rows(), 1);
        let again = deter.solve(&oracle, &params).unwrap().obj_val;
        assert!((again - v0).abs() < 1e-6);
    }

    #[test]
    fn test_objective_cut_can_make_model_infeasible() {
        let inst = instance();
        let mut deter = DeterministicModel::new(&inst, &[0]);
        deter.add_objective_cut(2.0);
        let sol = deter
            .solve(&GoodLpOracle::new(), &SolveParams::default())
            .unwrap();
        assert_eq!(sol.status, cclp_core::OracleStatus::Infeasible);
    }
}
