//! Adaptive partitioning solver.
//!
//! Scenarios are grouped into as few subsets as the tolerance allows and the
//! chance-constrained problem is solved over subsets instead of scenarios.
//! Each iteration:
//!
//! 1. solves the partitioned model for an upper bound `vUB` and a point `xUB`;
//! 2. stops if `xUB` is feasible for the scenario problem;
//! 3. projects on a scenario set of mass `1 - epsilon` for a lower bound;
//! 4. splits subsets until `xUB` violates more subsets than allowed;
//! 5. optionally merges subsets that `xUB` satisfies.

use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use cclp_core::{
    ChanceInstance, FeasibilityReport, Oracle, Partition, PartitionedView, ScenarioSet, TimeBudget,
};

use crate::big_m::BigMFinder;
use crate::bounds::BoundState;
use crate::error::{PartitionError, PartitionResult};
use crate::evaluator::{Evaluator, SubsetSolution};
use crate::informer::{Informer, IterationRecord};
use crate::initializer::create_first_partition;
use crate::lower_bound::{incumbent_heuristic, LowerBound, LowerBounder};
use crate::merger::merge_refined;
use crate::refiner::{RefineContext, RefineOutcome, Refiner};
use crate::settings::AdaptiveSettings;
use crate::upper_bound::{ahmed_bound, first_iteration_bound, UpperBounder};
use crate::warmstart::WarmStarter;

/// Final state of an adaptive run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdaptiveStatus {
    /// The upper-bound point is feasible or the gap closed.
    Optimal,
    /// The time budget ran out first.
    TimeLimit,
}

impl fmt::Display for AdaptiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdaptiveStatus::Optimal => write!(f, "Optimal"),
            AdaptiveStatus::TimeLimit => write!(f, "Time Limit"),
        }
    }
}

/// Result of [`AdaptivePartitioner::solve`].
#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveSummary {
    /// Final status.
    pub status: AdaptiveStatus,
    /// Final bounds and points.
    pub bounds: BoundState,
    /// Relative gap.
    pub gap: f64,
    /// Iterations started.
    pub iterations: usize,
    /// Final number of subsets.
    pub nb_subsets: usize,
    /// Wall time in seconds.
    pub elapsed: f64,
    /// One record per bounding step.
    pub records: Vec<IterationRecord>,
}

/// Adaptive partitioning solver over one instance.
pub struct AdaptivePartitioner<'a> {
    instance: &'a ChanceInstance,
    oracle: &'a dyn Oracle,
    settings: AdaptiveSettings,
    budget: TimeBudget,
    rng: ChaCha8Rng,

    partition: Partition,
    view: PartitionedView<'a>,
    costs: Vec<SubsetSolution>,

    bounds: BoundState,
    last_upper: Vec<f64>,
    last_report: Option<FeasibilityReport>,
    is_feasible: bool,
    iteration: usize,

    big_m: BigMFinder,
    refiner: Refiner,
    lower_bounder: LowerBounder<'a>,
    upper_bounder: UpperBounder,
    warm: WarmStarter,
    informer: Informer,
}

impl fmt::Debug for AdaptivePartitioner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptivePartitioner")
            .field("instance", &self.instance.name())
            .field("oracle", &self.oracle.name())
            .field("nb_subsets", &self.partition.len())
            .field("bounds", &self.bounds)
            .field("iteration", &self.iteration)
            .finish()
    }
}

impl<'a> AdaptivePartitioner<'a> {
    /// Build the first partition; the time budget starts now.
    pub fn new(
        instance: &'a ChanceInstance,
        oracle: &'a dyn Oracle,
        settings: AdaptiveSettings,
    ) -> PartitionResult<Self> {
        settings.validate()?;
        let budget = settings.budget();
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);

        let size = instance.minimum_partition_size();
        let evaluator = Evaluator::new(instance, oracle, &budget);
        let first = create_first_partition(size, settings.initial_partition, &evaluator, &mut rng)?;

        let mut bounds = BoundState::default();
        if let Some(scenario_costs) = &first.scenario_costs {
            let costs: Vec<f64> = scenario_costs.iter().map(|c| c.cost).collect();
            bounds.upper = ahmed_bound(&costs, instance.probabilities(), instance.epsilon());
            log::info!("Quantile upper bound {:.6}", bounds.upper);
        }

        let view = PartitionedView::new(instance, &first.partition);
        Ok(Self {
            instance,
            oracle,
            budget,
            rng,
            partition: first.partition,
            view,
            costs: Vec::new(),
            bounds,
            last_upper: Vec::new(),
            last_report: None,
            is_feasible: false,
            iteration: 0,
            big_m: BigMFinder::new(),
            refiner: Refiner::new(settings.split_method, settings.use_accurate_split)?,
            lower_bounder: LowerBounder::new(instance, settings.projection_method),
            upper_bounder: UpperBounder::new(settings.use_lazy, instance.is_continuous()),
            warm: WarmStarter::new(),
            informer: Informer::new(),
            settings,
        })
    }

    /// Current partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Current bounds.
    pub fn bounds(&self) -> &BoundState {
        &self.bounds
    }

    /// Run until the upper-bound point is feasible, the gap closes or the
    /// budget runs out.
    pub fn solve(mut self) -> PartitionResult<AdaptiveSummary> {
        log::info!(
            "Adaptive partitioning on {}: {} scenarios, tolerance {}, initial size {}",
            self.instance.name(),
            self.instance.nb_scenarios(),
            self.instance.tolerance_count(),
            self.partition.len()
        );
        self.costs = self.evaluator().partition_cost(&self.partition)?;
        let all: Vec<usize> = (0..self.partition.len()).collect();
        self.try_incumbent(&all);

        let mut gap_closed = false;
        self.iteration = 1;
        while !self.is_feasible && !self.budget.is_exhausted() {
            self.informer
                .log_iteration(self.iteration, &self.bounds, self.budget.elapsed());

            if self.settings.use_big_m
                && self.partition.len() > self.instance.minimum_partition_size()
            {
                self.big_m.update_partition(
                    &self.view,
                    self.bounds.upper,
                    self.settings.big_m_method,
                    self.oracle,
                    &self.budget,
                )?;
            }

            let found = self.upper_bound()?;
            self.store();
            if self.is_feasible || !found || self.budget.is_exhausted() {
                break;
            }

            self.lower_bound()?;
            self.store();
            if self.bounds.gap() <= self.settings.gap_tol {
                gap_closed = true;
                break;
            }
            if self.budget.is_exhausted() {
                break;
            }

            let refined = self.split()?;
            self.merge(&refined)?;
            if self.budget.is_exhausted() {
                break;
            }
            self.iteration += 1;
        }

        if self.is_feasible {
            self.bounds.close();
        }
        self.budget.finish();
        let status = if self.is_feasible || gap_closed {
            AdaptiveStatus::Optimal
        } else {
            AdaptiveStatus::TimeLimit
        };
        log::info!(
            "{status} after {} iterations: vLB {:.6}, vUB {:.6}, {} subsets, {:.2}s",
            self.iteration,
            self.bounds.lower,
            self.bounds.upper,
            self.partition.len(),
            self.budget.elapsed().as_secs_f64()
        );
        Ok(AdaptiveSummary {
            status,
            gap: self.bounds.gap(),
            bounds: self.bounds,
            iterations: self.iteration,
            nb_subsets: self.partition.len(),
            elapsed: self.budget.elapsed().as_secs_f64(),
            records: self.informer.into_records(),
        })
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(self.instance, self.oracle, &self.budget)
    }

    fn cost_values(&self) -> Vec<f64> {
        self.costs.iter().map(|c| c.cost).collect()
    }

    fn store(&mut self) {
        self.informer.store(
            self.iteration,
            self.budget.elapsed(),
            &self.bounds,
            self.partition.len(),
        );
    }

    fn try_incumbent(&mut self, subsets: &[usize]) {
        let found = incumbent_heuristic(
            self.instance,
            subsets.iter().filter_map(|&c| self.costs.get(c)),
            self.bounds.lower,
            self.bounds.upper,
        );
        if let Some(LowerBound::Bound { x, value }) = found {
            if self.bounds.offer_lower(&x, value) {
                log::info!("Incumbent heuristic improved vLB to {value:.6}");
            }
        }
    }

    /// Returns false when the budget ran out before a solution was found.
    fn upper_bound(&mut self) -> PartitionResult<bool> {
        let upper = if self.partition.len() == self.instance.minimum_partition_size() {
            first_iteration_bound(&self.costs)
        } else {
            let table = self.settings.use_big_m.then(|| self.big_m.table());
            let mut model = self.upper_bounder.build(&self.view, table)?;
            self.warm.apply(&mut model);
            self.upper_bounder.solve(
                model,
                &self.cost_values(),
                &self.bounds,
                self.oracle,
                &self.budget,
            )?
        };
        let Some(upper) = upper else {
            log::info!("Time limit reached while solving the partitioned model");
            return Ok(false);
        };

        if self.bounds.offer_upper(&upper.x, upper.obj, upper.bound) {
            log::debug!("vUB set to {:.6}", self.bounds.upper);
        }
        self.warm.record_solution(&upper.z);

        let report = self.instance.evaluate(&upper.x);
        log::info!(
            "Upper-bound point violates {} scenarios (tolerance {:.2}): {}",
            report.nb_infeasible(),
            report.tolerance,
            if report.is_feasible { "feasible" } else { "infeasible" }
        );
        self.lower_bounder.record_feasibility(&report);
        self.is_feasible = report.is_feasible;
        if self.is_feasible {
            self.bounds.accept_feasible_upper(&upper.x);
        }
        self.last_upper = upper.x;
        self.last_report = Some(report);
        Ok(true)
    }

    fn lower_bound(&mut self) -> PartitionResult<()> {
        let lower = self.lower_bounder.compute(
            &self.last_upper,
            self.bounds.lower,
            self.oracle,
            &self.budget,
        )?;
        if let LowerBound::Bound { x, value } = lower {
            if self.bounds.offer_lower(&x, value) {
                log::info!("Projection improved vLB to {value:.6}");
            }
        }
        Ok(())
    }

    fn split(&mut self) -> PartitionResult<RefineOutcome> {
        let report = self.last_report.as_ref().ok_or_else(|| {
            PartitionError::PartitionCheck("no upper-bound point to split against".into())
        })?;
        let costs: Vec<f64> = self.costs.iter().map(|c| c.cost).collect();
        let ctx = RefineContext {
            instance: self.instance,
            oracle: self.oracle,
            report,
            costs: &costs,
            upper_bound: self.bounds.upper,
            budget: &self.budget,
        };
        let refined = self.refiner.refine(&mut self.partition, &ctx, &mut self.rng)?;

        let evaluator = Evaluator::new(self.instance, self.oracle, &self.budget);
        for &c in &refined.new_subsets {
            let sol = evaluator.subset_cost(self.partition.subset(c))?;
            if self.settings.verbose {
                log::info!("Subset {c} ({} scenarios) costs {:.6}", self.partition.subset(c).len(), sol.cost);
            }
            match c.cmp(&self.costs.len()) {
                std::cmp::Ordering::Less => self.costs[c] = sol,
                std::cmp::Ordering::Equal => self.costs.push(sol),
                std::cmp::Ordering::Greater => {
                    return Err(PartitionError::PartitionCheck(format!(
                        "subset {c} appeared past the {} known subsets",
                        self.costs.len()
                    )))
                }
            }
        }
        self.try_incumbent(&refined.new_subsets);
        self.view.load_partition(&self.partition);
        Ok(refined)
    }

    fn merge(&mut self, refined: &RefineOutcome) -> PartitionResult<()> {
        if !self.settings.use_merger {
            return Ok(());
        }
        let costliest_new = refined
            .new_subsets
            .iter()
            .map(|&c| self.costs[c].cost)
            .fold(f64::NEG_INFINITY, f64::max);
        if costliest_new > self.bounds.upper {
            log::debug!("New subsets cost up to {costliest_new:.6} > vUB, no merge");
            return Ok(());
        }

        let costs = self.cost_values();
        let outcome = merge_refined(
            &mut self.partition,
            self.instance,
            refined,
            &costs,
            &self.last_upper,
        )?;
        self.costs = outcome.remap.apply(std::mem::take(&mut self.costs));
        let evaluator = Evaluator::new(self.instance, self.oracle, &self.budget);
        for &t in &outcome.targets {
            self.costs[t] = evaluator.subset_cost(self.partition.subset(t))?;
        }
        self.try_incumbent(&outcome.targets);
        log::info!(
            "Merged {} subsets into {:?}: {} subsets",
            outcome.deleted.len() + outcome.targets.len(),
            outcome.targets,
            self.partition.len()
        );
        self.warm.record_merge(outcome.remap);
        self.view.load_partition(&self.partition);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BigMMethod, InitialPartition, SplitMethod};
    use cclp_core::{GoodLpOracle, InstanceData};

    /// Eight scenarios over two variables; two may be violated.
    fn instance() -> ChanceInstance {
        let a = (0..8)
            .map(|s| {
                let t = s as f64;
                vec![vec![1.0 + 0.3 * t, 1.0], vec![1.0, 2.0 - 0.2 * t]]
            })
            .collect();
        let b = (0..8).map(|s| vec![1.0 + 0.1 * s as f64, 1.2]).collect();
        ChanceInstance::new(InstanceData::unit_box("adaptive", vec![1.0, 1.5], a, b, true, 0.25))
            .unwrap()
    }

    #[test]
    fn test_adaptive_run_closes() {
        let inst = instance();
        let oracle = GoodLpOracle::new();
        let settings = AdaptiveSettings::default()
            .with_strategy(InitialPartition::Cost, SplitMethod::Cost)
            .with_big_m(Some(BigMMethod::Belotti))
            .with_merger(true);
        let summary = AdaptivePartitioner::new(&inst, &oracle, settings)
            .unwrap()
            .solve()
            .unwrap();
        assert_eq!(summary.status, AdaptiveStatus::Optimal);
        assert!(summary.bounds.lower <= summary.bounds.upper + 1e-6);
        assert!(inst.is_feasible(&summary.bounds.x_lower));
        assert!(!summary.records.is_empty());
    }

    #[test]
    fn test_exhausted_budget_stops_before_iterating() {
        let inst = instance();
        let oracle = GoodLpOracle::new();
        let mut settings = AdaptiveSettings::default();
        settings.time_limit_ms = Some(0);
        let summary = AdaptivePartitioner::new(&inst, &oracle, settings)
            .unwrap()
            .solve()
            .unwrap();
        assert_eq!(summary.status, AdaptiveStatus::TimeLimit);
        assert!(summary.records.is_empty());
    }
}
