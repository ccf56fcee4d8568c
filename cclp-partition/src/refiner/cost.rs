//! Cost-driven split order.

use rand::RngCore;

use cclp_core::util::argsort;
use cclp_core::Partition;

use super::SplitOrder;

/// Visits subsets by increasing cost; scenarios keep their order.
///
/// Subsets created after the costs were computed come first.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostOrder;

impl SplitOrder for CostOrder {
    fn name(&self) -> &'static str {
        "cost"
    }

    fn sorted_subsets(&self, partition: &Partition, costs: &[f64], _rng: &mut dyn RngCore) -> Vec<usize> {
        let keys: Vec<f64> = (0..partition.len())
            .map(|c| costs.get(c).copied().unwrap_or(f64::NEG_INFINITY))
            .collect();
        argsort(&keys)
    }

    fn sorted_scenarios(&self, scenarios: &[usize], _rng: &mut dyn RngCore) -> Vec<usize> {
        scenarios.to_vec()
    }
}
