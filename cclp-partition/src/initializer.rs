//! First partition of the scenarios.

use rand::seq::SliceRandom;
use rand::Rng;

use cclp_core::util::argsort;
use cclp_core::Partition;

use crate::error::{PartitionError, PartitionResult};
use crate::evaluator::{Evaluator, SubsetSolution};
use crate::settings::InitialPartition;

/// First partition, with the single-scenario costs when they were computed.
#[derive(Debug, Clone)]
pub struct FirstPartition {
    /// Partition into the requested number of subsets.
    pub partition: Partition,
    /// Cost of every scenario alone (cost-based partitions only).
    pub scenario_costs: Option<Vec<SubsetSolution>>,
}

/// Deal `order` round-robin into `k` subsets: subset `i` gets `order[i::k]`.
fn deal(order: &[usize], k: usize) -> Partition {
    let mut subsets = vec![Vec::with_capacity(order.len() / k + 1); k];
    for (pos, &s) in order.iter().enumerate() {
        subsets[pos % k].push(s);
    }
    Partition::from_subsets(subsets)
}

/// Build a partition of the scenarios into `k` subsets.
pub fn create_first_partition<R: Rng + ?Sized>(
    k: usize,
    kind: InitialPartition,
    evaluator: &Evaluator<'_>,
    rng: &mut R,
) -> PartitionResult<FirstPartition> {
    let n = evaluator.instance().nb_scenarios();
    if k == 0 || k > n {
        return Err(PartitionError::Config(format!(
            "cannot partition {n} scenarios into {k} subsets"
        )));
    }

    let first = match kind {
        InitialPartition::Random => {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(rng);
            FirstPartition {
                partition: deal(&order, k),
                scenario_costs: None,
            }
        }
        InitialPartition::Cost => {
            let costs = evaluator.scenario_costs()?;
            let negated: Vec<f64> = costs.iter().map(|c| -c.cost).collect();
            FirstPartition {
                partition: deal(&argsort(&negated), k),
                scenario_costs: Some(costs),
            }
        }
    };

    first
        .partition
        .check(n, Some(k))
        .map_err(|e| PartitionError::PartitionCheck(e.to_string()))?;
    log::info!("Created a {kind} partition of size {k}");
    Ok(first)
}
