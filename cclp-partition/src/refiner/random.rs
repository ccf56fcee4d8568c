//! Random split order.

use rand::seq::SliceRandom;
use rand::RngCore;

use cclp_core::Partition;

use super::SplitOrder;

/// Visits subsets in random order and permutes scenarios before dealing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOrder;

impl SplitOrder for RandomOrder {
    fn name(&self) -> &'static str {
        "random"
    }

    fn sorted_subsets(&self, partition: &Partition, _costs: &[f64], rng: &mut dyn RngCore) -> Vec<usize> {
        let mut order: Vec<usize> = (0..partition.len()).collect();
        order.shuffle(rng);
        order
    }

    fn sorted_scenarios(&self, scenarios: &[usize], rng: &mut dyn RngCore) -> Vec<usize> {
        let mut order = scenarios.to_vec();
        order.shuffle(rng);
        order
    }
}
