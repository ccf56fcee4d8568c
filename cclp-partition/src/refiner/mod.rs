//! Partition refinement.
//!
//! After an upper-bound solution `xUB` violates too many scenarios, the
//! refiner splits subsets holding at least two violated scenarios so that
//! both children hold one. Each split adds one infeasible subset; `mu` splits
//! bring the count past the tolerance, which cuts `xUB` off the next
//! partitioned problem.

mod cost;
mod random;

pub use cost::CostOrder;
pub use random::RandomOrder;

use std::collections::HashMap;

use rand::RngCore;

use cclp_core::{ChanceInstance, FeasibilityReport, Oracle, Partition, SolveParams, TimeBudget};

use crate::error::{PartitionError, PartitionResult};
use crate::models::{AccurateSplit, AccurateSplitModel};
use crate::settings::SplitMethod;

/// Order in which subsets are visited and scenarios dealt.
pub trait SplitOrder {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Subset indices in visiting order.
    fn sorted_subsets(&self, partition: &Partition, costs: &[f64], rng: &mut dyn RngCore) -> Vec<usize>;

    /// Scenarios of one subset in dealing order.
    fn sorted_scenarios(&self, scenarios: &[usize], rng: &mut dyn RngCore) -> Vec<usize>;
}

/// Inputs of one refinement.
#[derive(Clone, Copy)]
pub struct RefineContext<'a> {
    /// Scenario-level instance.
    pub instance: &'a ChanceInstance,
    /// Oracle for the accurate split model.
    pub oracle: &'a dyn Oracle,
    /// Feasibility of the last upper-bound solution.
    pub report: &'a FeasibilityReport,
    /// Current subset costs.
    pub costs: &'a [f64],
    /// Current upper bound.
    pub upper_bound: f64,
    /// Time left for the accurate split models.
    pub budget: &'a TimeBudget,
}

/// Result of one refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineOutcome {
    /// Number of splits performed.
    pub mu: usize,
    /// Subsets created or modified, ascending.
    pub new_subsets: Vec<usize>,
    /// Subsets of the refined partition satisfied by `xUB`.
    pub feasible_subsets: Vec<usize>,
    /// Subsets of the refined partition violated by `xUB`.
    pub infeasible_subsets: Vec<usize>,
}

type SplitKey = (Vec<usize>, Vec<usize>);

/// Splits subsets until the last upper-bound solution is cut off.
pub struct Refiner {
    order: Box<dyn SplitOrder>,
    accurate: bool,
    memo: HashMap<SplitKey, AccurateSplit>,
}

impl std::fmt::Debug for Refiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refiner")
            .field("order", &self.order.name())
            .field("accurate", &self.accurate)
            .field("memo", &self.memo.len())
            .finish()
    }
}

impl Refiner {
    /// Refiner for `method`; cost splits require the accurate split.
    pub fn new(method: SplitMethod, accurate: bool) -> PartitionResult<Self> {
        let order: Box<dyn SplitOrder> = match method {
            SplitMethod::Random => Box::new(RandomOrder),
            SplitMethod::Cost if accurate => Box::new(CostOrder),
            SplitMethod::Cost => {
                return Err(PartitionError::Config(
                    "cost-based splitting requires the accurate split".into(),
                ))
            }
        };
        Ok(Self {
            order,
            accurate,
            memo: HashMap::new(),
        })
    }

    /// Number of memoized accurate splits.
    pub fn nb_memoized(&self) -> usize {
        self.memo.len()
    }

    /// Split `partition` in place.
    pub fn refine(
        &mut self,
        partition: &mut Partition,
        ctx: &RefineContext<'_>,
        rng: &mut dyn RngCore,
    ) -> PartitionResult<RefineOutcome> {
        let instance = ctx.instance;
        let is_infeasible = |s: usize| ctx.report.is_scenario_infeasible(s);
        let nb_infeasible = partition
            .count_members(is_infeasible)
            .iter()
            .filter(|&&n| n > 0)
            .count();
        let tolerance = instance.tolerance_count();
        if nb_infeasible > tolerance {
            return Err(PartitionError::NoSplitRequired {
                nb_infeasible,
                tolerance,
            });
        }
        let mu = tolerance + 1 - nb_infeasible;
        let before = partition.clone();

        let mut new_subsets = if self.accurate {
            self.accurate_splits(partition, ctx, mu, rng)?
        } else {
            self.simple_splits(partition, ctx, mu, rng)?
        };
        new_subsets.sort_unstable();
        new_subsets.dedup();

        partition
            .check(instance.nb_scenarios(), Some(before.len() + mu))
            .map_err(|e| PartitionError::PartitionCheck(e.to_string()))?;
        if *partition == before {
            return Err(PartitionError::PartitionCheck(
                "refinement left the partition unchanged".into(),
            ));
        }

        let counts = partition.count_members(is_infeasible);
        let (infeasible_subsets, feasible_subsets): (Vec<usize>, Vec<usize>) =
            (0..partition.len()).partition(|&c| counts[c] > 0);
        log::info!(
            "Split {mu} subsets with the {} order: {} subsets, {} infeasible",
            self.order.name(),
            partition.len(),
            infeasible_subsets.len()
        );
        Ok(RefineOutcome {
            mu,
            new_subsets,
            feasible_subsets,
            infeasible_subsets,
        })
    }

    fn infeasible_members(partition: &Partition, c: usize, report: &FeasibilityReport) -> Vec<usize> {
        partition
            .subset(c)
            .iter()
            .copied()
            .filter(|&s| report.is_scenario_infeasible(s))
            .collect()
    }

    /// Deal infeasible then feasible scenarios alternately between the two
    /// children, so that each child gets one infeasible scenario.
    fn deal(&self, members: &[usize], report: &FeasibilityReport, rng: &mut dyn RngCore) -> (Vec<usize>, Vec<usize>) {
        let (infeasible, feasible): (Vec<usize>, Vec<usize>) = self
            .order
            .sorted_scenarios(members, rng)
            .into_iter()
            .partition(|&s| report.is_scenario_infeasible(s));
        let mut keep = Vec::with_capacity(members.len() / 2 + 1);
        let mut moved = Vec::with_capacity(members.len() / 2 + 1);
        for group in [infeasible, feasible] {
            for (pos, s) in group.into_iter().enumerate() {
                if pos % 2 == 0 {
                    keep.push(s);
                } else {
                    moved.push(s);
                }
            }
        }
        (keep, moved)
    }

    fn simple_splits(
        &mut self,
        partition: &mut Partition,
        ctx: &RefineContext<'_>,
        mu: usize,
        rng: &mut dyn RngCore,
    ) -> PartitionResult<Vec<usize>> {
        let mut touched = Vec::with_capacity(2 * mu);
        let mut done = 0;
        while done < mu {
            let mut progressed = false;
            for c in self.order.sorted_subsets(partition, ctx.costs, rng) {
                if done == mu {
                    break;
                }
                if Self::infeasible_members(partition, c, ctx.report).len() < 2 {
                    continue;
                }
                let (keep, moved) = self.deal(partition.subset(c), ctx.report, rng);
                let new = partition.split_off(c, keep, moved);
                log::debug!("Split subset {c} into {c} and {new}");
                touched.extend([c, new]);
                done += 1;
                progressed = true;
            }
            if !progressed {
                return Err(PartitionError::NotEnoughSplits { done, required: mu });
            }
        }
        Ok(touched)
    }

    /// Accurate split of one subset. Once the budget is spent the scenarios
    /// are dealt instead and the predicted cost is unknown (`-inf`).
    fn evaluate(
        &mut self,
        members: &[usize],
        infeasible: &[usize],
        ctx: &RefineContext<'_>,
        rng: &mut dyn RngCore,
    ) -> PartitionResult<AccurateSplit> {
        let mut scenarios = members.to_vec();
        scenarios.sort_unstable();
        let mut violated = infeasible.to_vec();
        violated.sort_unstable();
        let key = (scenarios, violated);
        if let Some(split) = self.memo.get(&key) {
            return Ok(split.clone());
        }
        let solved = if ctx.budget.is_exhausted() {
            None
        } else {
            let params = SolveParams::default().with_time_limit(ctx.budget.remaining());
            AccurateSplitModel::build(ctx.instance, &key.0, &key.1).solve(ctx.oracle, &params)?
        };
        match solved {
            Some(split) => {
                self.memo.insert(key, split.clone());
                Ok(split)
            }
            None => {
                log::debug!("Time limit reached, dealing {} scenarios instead", members.len());
                let (left, right) = self.deal(members, ctx.report, rng);
                Ok(AccurateSplit {
                    cost: f64::NEG_INFINITY,
                    left,
                    right,
                })
            }
        }
    }

    /// Largest predicted cost not above `upper_bound`, or the smallest one.
    /// Ties go to the later candidate.
    fn pick(candidates: &[(usize, AccurateSplit)], upper_bound: f64) -> usize {
        let mut below: Option<usize> = None;
        let mut lowest = 0;
        for (pos, (_, split)) in candidates.iter().enumerate() {
            if split.cost <= upper_bound
                && below.map_or(true, |b| split.cost >= candidates[b].1.cost)
            {
                below = Some(pos);
            }
            if split.cost < candidates[lowest].1.cost {
                lowest = pos;
            }
        }
        below.unwrap_or(lowest)
    }

    fn accurate_splits(
        &mut self,
        partition: &mut Partition,
        ctx: &RefineContext<'_>,
        mu: usize,
        rng: &mut dyn RngCore,
    ) -> PartitionResult<Vec<usize>> {
        let mut candidates = Vec::new();
        for c in self.order.sorted_subsets(partition, ctx.costs, rng) {
            let infeasible = Self::infeasible_members(partition, c, ctx.report);
            if infeasible.len() >= 2 {
                let split = self.evaluate(partition.subset(c), &infeasible, ctx, rng)?;
                candidates.push((c, split));
            }
        }

        let mut touched = Vec::with_capacity(2 * mu);
        for done in 0..mu {
            if candidates.is_empty() {
                return Err(PartitionError::NotEnoughSplits { done, required: mu });
            }
            let (c, split) = candidates.remove(Self::pick(&candidates, ctx.upper_bound));
            let new = partition.split_off(c, split.left, split.right);
            log::debug!(
                "Split subset {c} into {c} and {new}, predicted cost {:.4}",
                split.cost
            );
            touched.extend([c, new]);
            for child in [c, new] {
                let infeasible = Self::infeasible_members(partition, child, ctx.report);
                if infeasible.len() >= 2 {
                    let split = self.evaluate(partition.subset(child), &infeasible, ctx, rng)?;
                    candidates.push((child, split));
                }
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{GoodLpOracle, InstanceData};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Six scenarios capping x_0 or x_1; tolerance of two violations.
    fn instance() -> ChanceInstance {
        let a = (0..6)
            .map(|s| vec![if s % 2 == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] }])
            .collect();
        let b = (0..6).map(|s| vec![0.1 * (s + 1) as f64]).collect();
        ChanceInstance::new(InstanceData::unit_box("refine", vec![1.0, 1.0], a, b, true, 0.34)).unwrap()
    }

    fn refine(method: SplitMethod, accurate: bool) -> (Partition, RefineOutcome) {
        refine_within(method, accurate, TimeBudget::unlimited()).0
    }

    fn refine_within(method: SplitMethod, accurate: bool, budget: TimeBudget) -> ((Partition, RefineOutcome), usize) {
        let inst = instance();
        let oracle = GoodLpOracle::new();
        // x = (1, 1) violates every scenario.
        let report = inst.evaluate(&[1.0, 1.0]);
        let mut partition = Partition::from_subsets(vec![vec![0, 1, 2], vec![3, 4, 5]]);
        let ctx = RefineContext {
            instance: &inst,
            oracle: &oracle,
            report: &report,
            costs: &[0.3, 0.5],
            upper_bound: f64::INFINITY,
            budget: &budget,
        };
        let mut refiner = Refiner::new(method, accurate).unwrap();
        let outcome = refiner
            .refine(&mut partition, &ctx, &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        ((partition, outcome), refiner.nb_memoized())
    }

    #[test]
    fn test_split_adds_mu_subsets() {
        for (method, accurate) in [
            (SplitMethod::Random, false),
            (SplitMethod::Random, true),
            (SplitMethod::Cost, true),
        ] {
            let (partition, outcome) = refine(method, accurate);
            // Tolerance 2, two infeasible subsets: one split.
            assert_eq!(outcome.mu, 1);
            assert_eq!(partition.len(), 3);
            partition.check(6, Some(3)).unwrap();
            assert_eq!(outcome.infeasible_subsets, vec![0, 1, 2]);
            assert!(outcome.feasible_subsets.is_empty());
            assert!(outcome.new_subsets.contains(&2));
        }
    }

    #[test]
    fn test_spent_budget_deals_instead_of_solving() {
        let start = std::time::Instant::now();
        let ((partition, outcome), memoized) =
            refine_within(SplitMethod::Cost, true, TimeBudget::new(std::time::Duration::ZERO));
        assert!(start.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(memoized, 0);
        assert_eq!(outcome.mu, 1);
        partition.check(6, Some(3)).unwrap();
        // Both children of the dealt subset hold an infeasible scenario.
        assert_eq!(outcome.infeasible_subsets, vec![0, 1, 2]);

        let (_, memoized) = refine_within(SplitMethod::Cost, true, TimeBudget::unlimited());
        assert_eq!(memoized, 3);
    }

    #[test]
    fn test_cost_split_without_accurate_mode_is_rejected() {
        assert!(matches!(
            Refiner::new(SplitMethod::Cost, false),
            Err(PartitionError::Config(_))
        ));
    }

    #[test]
    fn test_no_split_when_already_cut_off() {
        let inst = instance();
        let oracle = GoodLpOracle::new();
        let report = inst.evaluate(&[1.0, 1.0]);
        let budget = TimeBudget::unlimited();
        let mut partition = Partition::from_subsets((0..6).map(|s| vec![s]).collect());
        let ctx = RefineContext {
            instance: &inst,
            oracle: &oracle,
            report: &report,
            costs: &[],
            upper_bound: f64::INFINITY,
            budget: &budget,
        };
        let res = Refiner::new(SplitMethod::Random, false)
            .unwrap()
            .refine(&mut partition, &ctx, &mut ChaCha8Rng::seed_from_u64(0));
        assert!(matches!(res, Err(PartitionError::NoSplitRequired { .. })));
    }

    #[test]
    fn test_pick_prefers_largest_cost_below_bound() {
        let split = |cost| AccurateSplit {
            cost,
            left: vec![0],
            right: vec![1],
        };
        let candidates = vec![(0, split(3.0)), (1, split(1.0)), (2, split(2.0))];
        assert_eq!(Refiner::pick(&candidates, 2.5), 2);
        assert_eq!(Refiner::pick(&candidates, 0.5), 1);

        let tied = vec![(0, split(2.0)), (1, split(2.0)), (2, split(3.0))];
        assert_eq!(Refiner::pick(&tied, 2.5), 1);
    }
}
