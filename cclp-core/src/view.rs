//! Subset-level view of an instance under a partition.

use crate::instance::{ChanceInstance, ScenarioSet, VarType};
use crate::partition::Partition;

/// Aggregated instance where every subset acts as one scenario.
///
/// Subset `c` stacks the rows of its member scenarios in member order, has
/// probability `min_{s in c} p_s` renormalized over subsets, and the view's
/// tolerance is `epsilon / sum_c min_{s in c} p_s`.
#[derive(Debug, Clone)]
pub struct PartitionedView<'a> {
    instance: &'a ChanceInstance,
    subsets: Vec<Vec<usize>>,
    proba: Vec<f64>,
    epsilon: f64,
}

impl<'a> PartitionedView<'a> {
    /// View of `instance` under `partition`.
    pub fn new(instance: &'a ChanceInstance, partition: &Partition) -> Self {
        let mut view = Self {
            instance,
            subsets: Vec::new(),
            proba: Vec::new(),
            epsilon: instance.epsilon(),
        };
        view.load_partition(partition);
        view
    }

    /// Rebuild every derived quantity for a new partition.
    pub fn load_partition(&mut self, partition: &Partition) {
        let base = self.instance.probabilities();
        self.subsets = partition.subsets().to_vec();
        self.proba = self
            .subsets
            .iter()
            .map(|members| {
                members
                    .iter()
                    .map(|&s| base[s])
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = self.proba.iter().sum();
        for p in &mut self.proba {
            *p /= total;
        }
        self.epsilon = self.instance.epsilon() / total;
    }

    /// Underlying scenario-level instance.
    pub fn instance(&self) -> &'a ChanceInstance {
        self.instance
    }

    /// Member scenarios of subset `c`.
    pub fn members(&self, c: usize) -> &[usize] {
        &self.subsets[c]
    }

    /// Map a local row of subset `c` to `(scenario, constraint)`.
    pub fn locate(&self, c: usize, j: usize) -> (usize, usize) {
        let m = self.instance.nb_constraints();
        (self.subsets[c][j / m], j % m)
    }
}

impl ScenarioSet for PartitionedView<'_> {
    fn nb_vars(&self) -> usize {
        self.instance.nb_vars()
    }

    fn nb_blocks(&self) -> usize {
        self.subsets.len()
    }

    fn nb_rows(&self, k: usize) -> usize {
        self.subsets[k].len() * self.instance.nb_constraints()
    }

    fn row(&self, k: usize, i: usize) -> &[f64] {
        let (s, r) = self.locate(k, i);
        self.instance.row(s, r)
    }

    fn rhs(&self, k: usize, i: usize) -> f64 {
        let (s, r) = self.locate(k, i);
        self.instance.rhs(s, r)
    }

    fn probabilities(&self) -> &[f64] {
        &self.proba
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn cost(&self) -> &[f64] {
        self.instance.cost()
    }

    fn var_types(&self) -> &[VarType] {
        self.instance.var_types()
    }

    fn var_lb(&self) -> &[f64] {
        self.instance.var_lb()
    }

    fn var_ub(&self) -> &[f64] {
        self.instance.var_ub()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceData;

    fn instance() -> ChanceInstance {
        let a = (0..4)
            .map(|s| vec![vec![s as f64, 1.0], vec![1.0, s as f64]])
            .collect();
        let b = vec![vec![1.0, 2.0]; 4];
        ChanceInstance::new(InstanceData::unit_box("view", vec![1.0, 2.0], a, b, true, 0.25))
            .unwrap()
    }

    #[test]
    fn test_stacked_rows_and_probabilities() {
        let inst = instance();
        let part = Partition::from_subsets(vec![vec![2, 0], vec![1], vec![3]]);
        let view = PartitionedView::new(&inst, &part);
        assert_eq!(view.nb_blocks(), 3);
        assert_eq!(view.nb_rows(0), 4);
        assert_eq!(view.row(0, 0), &[2.0, 1.0]);
        assert_eq!(view.row(0, 3), &[1.0, 0.0]);
        assert_eq!(view.rhs(0, 1), 2.0);
        let total: f64 = view.probabilities().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((view.probabilities()[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((view.epsilon() - 0.25 / 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_reload_replaces_subsets() {
        let inst = instance();
        let mut view = PartitionedView::new(&inst, &Partition::from_subsets(vec![vec![0, 1, 2, 3]]));
        assert_eq!(view.nb_blocks(), 1);
        view.load_partition(&Partition::from_subsets(vec![vec![0, 1], vec![2, 3]]));
        assert_eq!(view.nb_blocks(), 2);
        assert_eq!(view.members(1), &[2, 3]);
        assert!((view.epsilon() - 0.5).abs() < 1e-12);
    }
}
