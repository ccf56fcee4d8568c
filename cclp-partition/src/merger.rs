//! Partition coarsening after a refinement.
//!
//! Merging keeps the partition small: subsets satisfied by the last
//! upper-bound solution are unioned as long as the solution stays cut off,
//! i.e. as long as more than `tolerance_count` subsets remain violated.

use cclp_core::util::{dot, norm2};
use cclp_core::{ChanceInstance, IndexRemap, Partition, ScenarioSet};

use crate::error::{PartitionError, PartitionResult};
use crate::refiner::RefineOutcome;

/// Result of one merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Indices, in the merged partition, of the subsets that absorbed others.
    pub targets: Vec<usize>,
    /// Indices, in the partition before merging, of the absorbed subsets.
    pub deleted: Vec<usize>,
    /// Old-to-new subset index map.
    pub remap: IndexRemap,
}

/// Union `candidates` into the smallest of them and delete the rest.
pub fn merge_all(partition: &mut Partition, candidates: &[usize]) -> PartitionResult<MergeOutcome> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() < 2 {
        return Err(PartitionError::Merge(format!(
            "need at least two subsets, got {sorted:?}"
        )));
    }
    if let Some(&c) = sorted.iter().find(|&&c| c >= partition.len()) {
        return Err(PartitionError::Merge(format!("subset {c} does not exist")));
    }
    let target = sorted[0];
    let deleted = sorted.split_off(1);
    for &c in &deleted {
        partition.merge_into(target, c);
    }
    let remap = partition.compact(&deleted);
    let targets = remap.get(target).into_iter().collect();
    Ok(MergeOutcome {
        targets,
        deleted,
        remap,
    })
}

/// Smallest rescaled slack `(b_i - A_i x) / ||A_i||` over the rows of `members`.
fn margin(instance: &ChanceInstance, members: &[usize], x: &[f64]) -> f64 {
    members
        .iter()
        .flat_map(|&s| (0..instance.nb_constraints()).map(move |i| (s, i)))
        .map(|(s, i)| {
            let row = instance.row(s, i);
            let slack = instance.rhs(s, i) - dot(row, x);
            let norm = norm2(row);
            if norm > 0.0 {
                slack / norm
            } else {
                slack
            }
        })
        .fold(f64::INFINITY, f64::min)
}

/// Merge the `mu + 1` candidates with the largest margin under `x`.
pub fn merge_feasible(
    partition: &mut Partition,
    instance: &ChanceInstance,
    x: &[f64],
    candidates: &[usize],
    mu: usize,
) -> PartitionResult<MergeOutcome> {
    if candidates.len() < mu + 1 {
        return Err(PartitionError::Merge(format!(
            "{} feasible subsets cannot absorb {mu} splits",
            candidates.len()
        )));
    }
    let mut ranked: Vec<(usize, f64)> = candidates
        .iter()
        .map(|&c| (c, margin(instance, partition.subset(c), x)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let chosen: Vec<usize> = ranked.iter().take(mu + 1).map(|&(c, _)| c).collect();
    merge_all(partition, &chosen)
}

/// Merge right after a refinement so that exactly `tolerance_count + 1`
/// subsets stay violated by `x`.
///
/// With exactly `mu` feasible subsets, they are merged together with the
/// costliest infeasible subset, which brings the partition back to its
/// minimum size. With more, the `mu + 1` best-margin feasible subsets are
/// merged.
pub fn merge_refined(
    partition: &mut Partition,
    instance: &ChanceInstance,
    refined: &RefineOutcome,
    costs: &[f64],
    x: &[f64],
) -> PartitionResult<MergeOutcome> {
    let mu = refined.mu;
    let feasible = &refined.feasible_subsets;
    if feasible.len() == mu {
        let costliest = refined
            .infeasible_subsets
            .iter()
            .copied()
            .fold(None, |best: Option<usize>, c| match best {
                Some(b) if costs[b] >= costs[c] => Some(b),
                _ => Some(c),
            })
            .ok_or_else(|| PartitionError::Merge("no infeasible subset to merge into".into()))?;
        let mut candidates = feasible.clone();
        candidates.push(costliest);
        let outcome = merge_all(partition, &candidates)?;
        let minimum = instance.minimum_partition_size();
        if partition.len() != minimum {
            return Err(PartitionError::Merge(format!(
                "merged partition has {} subsets, expected {minimum}",
                partition.len()
            )));
        }
        Ok(outcome)
    } else if feasible.len() > mu {
        merge_feasible(partition, instance, x, feasible, mu)
    } else {
        Err(PartitionError::Merge(format!(
            "{} feasible subsets for {mu} splits",
            feasible.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::InstanceData;

    fn instance() -> ChanceInstance {
        let a = vec![vec![vec![1.0]]; 6];
        let b = (0..6).map(|s| vec![0.1 * (s + 1) as f64]).collect();
        ChanceInstance::new(InstanceData::unit_box("merge", vec![1.0], a, b, true, 0.2)).unwrap()
    }

    #[test]
    fn test_merge_all_compacts() {
        let mut partition = Partition::from_subsets(vec![vec![0], vec![1], vec![2, 3], vec![4], vec![5]]);
        let outcome = merge_all(&mut partition, &[4, 1, 3]).unwrap();
        assert_eq!(outcome.deleted, vec![3, 4]);
        assert_eq!(outcome.targets, vec![1]);
        assert_eq!(partition.len(), 3);
        assert_eq!(partition.subset(1), &[1, 4, 5]);
        assert_eq!(outcome.remap.old_len(), partition.len() + outcome.deleted.len());
        partition.check(6, Some(3)).unwrap();
    }

    #[test]
    fn test_merge_feasible_takes_best_margins() {
        let inst = instance();
        let mut partition = Partition::from_subsets((0..6).map(|s| vec![s]).collect());
        // x = 0.25 satisfies scenarios 2..5 with margins 0.05, 0.15, 0.25, 0.35.
        let outcome = merge_feasible(&mut partition, &inst, &[0.25], &[2, 3, 4, 5], 1).unwrap();
        assert_eq!(outcome.deleted, vec![5]);
        assert_eq!(partition.subset(4), &[4, 5]);
    }

    #[test]
    fn test_merge_refined_back_to_minimum_size() {
        let inst = instance();
        // Tolerance 1, minimum size 2; x = 0.35 violates scenarios 0..2.
        let mut partition = Partition::from_subsets(vec![vec![0, 3], vec![1], vec![2, 4, 5]]);
        let refined = RefineOutcome {
            mu: 1,
            new_subsets: vec![0, 1],
            feasible_subsets: vec![],
            infeasible_subsets: vec![0, 1, 2],
        };
        assert!(merge_refined(&mut partition, &inst, &refined, &[0.1, 0.2, 0.3], &[0.35]).is_err());

        let mut partition = Partition::from_subsets(vec![vec![0, 1], vec![2], vec![3, 4, 5]]);
        let refined = RefineOutcome {
            mu: 1,
            new_subsets: vec![0, 2],
            feasible_subsets: vec![2],
            infeasible_subsets: vec![0, 1],
        };
        let outcome = merge_refined(&mut partition, &inst, &refined, &[0.1, 0.3, 0.4], &[0.25]).unwrap();
        assert_eq!(partition.len(), inst.minimum_partition_size());
        assert_eq!(outcome.targets, vec![1]);
        assert_eq!(partition.subset(1), &[2, 3, 4, 5]);
    }
}
