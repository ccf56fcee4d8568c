//! Lower bounds from scenario projections and the incumbent heuristic.
//!
//! Any point satisfying a set of scenarios of probability at least
//! `1 - epsilon` is feasible for the chance-constrained problem, so the
//! deterministic problem restricted to such a set yields a feasible point and
//! a lower bound. Scenarios are picked by a priority that favours those the
//! upper-bound solutions keep satisfying.

use cclp_core::util::{argsort, dot, norm2};
use cclp_core::{
    ChanceInstance, FeasibilityReport, Oracle, OracleStatus, RowId, ScenarioSet, SolveParams,
    TimeBudget,
};

use crate::error::PartitionResult;
use crate::evaluator::SubsetSolution;
use crate::models::DeterministicModel;
use crate::settings::ProjectionMethod;

/// Violations below this are ignored by the rescaled priority.
const VIOLATION_FLOOR: f64 = 1e-3;

/// Slack on the probability mass of the projected scenarios.
const MASS_GUARD: f64 = 1e-7;

/// Slack on the incumbent acceptance test.
const INCUMBENT_TOL: f64 = 1e-8;

/// Outcome of one lower-bound computation.
#[derive(Debug, Clone, PartialEq)]
pub enum LowerBound {
    /// Feasible point and its objective.
    Bound {
        /// Feasible point.
        x: Vec<f64>,
        /// Objective of `x`.
        value: f64,
    },
    /// The projection could not improve the current bound.
    NoBound,
}

/// Persistent projection model over the scenarios.
#[derive(Debug)]
pub struct LowerBounder<'a> {
    instance: &'a ChanceInstance,
    model: DeterministicModel<'a, ChanceInstance>,
    method: ProjectionMethod,
    feasibility_counter: Vec<u64>,
    cut: Option<RowId>,
    previous_cut: f64,
}

impl<'a> LowerBounder<'a> {
    /// Projection model starting with scenario 0.
    pub fn new(instance: &'a ChanceInstance, method: ProjectionMethod) -> Self {
        Self {
            instance,
            model: DeterministicModel::new(instance, &[0]),
            method,
            feasibility_counter: vec![0; instance.nb_scenarios()],
            cut: None,
            previous_cut: -1e6,
        }
    }

    /// Count the scenarios satisfied by the last upper-bound solution.
    pub fn record_feasibility(&mut self, report: &FeasibilityReport) {
        for (count, ok) in self.feasibility_counter.iter_mut().zip(report.feasible_scenarios()) {
            if ok {
                *count += 1;
            }
        }
    }

    /// Scenario priorities under `x_ub`, lower first.
    pub fn priorities(&self, x_ub: &[f64]) -> Vec<f64> {
        match self.method {
            ProjectionMethod::Counter => self
                .feasibility_counter
                .iter()
                .map(|&n| -(n as f64))
                .collect(),
            ProjectionMethod::RescaledMaxViolation => (0..self.instance.nb_scenarios())
                .map(|s| {
                    if x_ub.is_empty() {
                        return 0.0;
                    }
                    (0..self.instance.nb_constraints())
                        .map(|i| {
                            let row = self.instance.row(s, i);
                            let v = (dot(row, x_ub) - self.instance.rhs(s, i)).max(0.0);
                            if v < VIOLATION_FLOOR {
                                return 0.0;
                            }
                            let norm = norm2(row);
                            if norm != 0.0 {
                                v / norm
                            } else {
                                v
                            }
                        })
                        .fold(0.0, f64::max)
                })
                .collect(),
        }
    }

    /// Scenarios of least priority whose mass reaches `1 - epsilon`.
    pub fn select(&self, x_ub: &[f64]) -> Vec<usize> {
        let proba = self.instance.probabilities();
        let target = 1.0 - self.instance.epsilon() - MASS_GUARD;
        let mut mass = 0.0;
        let mut selected = Vec::new();
        for s in argsort(&self.priorities(x_ub)) {
            if mass >= target {
                break;
            }
            mass += proba[s];
            selected.push(s);
        }
        selected.sort_unstable();
        selected
    }

    /// Solve the projection selected under `x_ub`, requiring an objective of
    /// at least `lower_bound`.
    pub fn compute(
        &mut self,
        x_ub: &[f64],
        lower_bound: f64,
        oracle: &dyn Oracle,
        budget: &TimeBudget,
    ) -> PartitionResult<LowerBound> {
        let selected = self.select(x_ub);
        let unused: Vec<usize> = self
            .model
            .blocks()
            .filter(|s| selected.binary_search(s).is_err())
            .collect();
        self.model.remove(&unused);
        self.model.add(&selected);
        log::debug!(
            "Projection on {} scenarios ({} dropped)",
            selected.len(),
            unused.len()
        );

        if lower_bound.is_finite() && lower_bound >= self.previous_cut {
            self.replace_cut(lower_bound);
            self.previous_cut = lower_bound;
        }

        let params = SolveParams::default().with_time_limit(budget.remaining());
        let sol = self.model.solve(oracle, &params)?;
        Ok(match sol.status {
            OracleStatus::Optimal | OracleStatus::TimeLimit if sol.has_solution() => {
                let x: Vec<f64> = sol.x[..self.instance.nb_vars()].to_vec();
                LowerBound::Bound {
                    value: self.instance.objective(&x),
                    x,
                }
            }
            status => {
                log::debug!("Projection gave no bound ({status:?})");
                LowerBound::NoBound
            }
        })
    }

    fn replace_cut(&mut self, value: f64) {
        if let Some(old) = self.cut.take() {
            self.model.remove_row(old);
        }
        self.cut = Some(self.model.add_objective_cut(value));
    }
}

/// First candidate, by decreasing cost, with `lower_bound < cost <= upper_bound`
/// that is feasible for the whole instance.
pub fn incumbent_heuristic<'s>(
    instance: &ChanceInstance,
    candidates: impl IntoIterator<Item = &'s SubsetSolution>,
    lower_bound: f64,
    upper_bound: f64,
) -> Option<LowerBound> {
    let mut sorted: Vec<&SubsetSolution> = candidates.into_iter().collect();
    sorted.sort_by(|a, b| b.cost.total_cmp(&a.cost));
    sorted
        .into_iter()
        .filter(|sol| {
            sol.is_known() && lower_bound + INCUMBENT_TOL <= sol.cost && sol.cost <= upper_bound
        })
        .find(|sol| instance.is_feasible(&sol.x))
        .map(|sol| LowerBound::Bound {
            x: sol.x.clone(),
            value: sol.cost,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{GoodLpOracle, InstanceData};

    /// Five scenarios capping x at 0.1 .. 0.5; one may be violated.
    fn instance() -> ChanceInstance {
        let a = vec![vec![vec![1.0]]; 5];
        let b = (0..5).map(|s| vec![0.1 * (s + 1) as f64]).collect();
        ChanceInstance::new(InstanceData::unit_box("lb", vec![1.0], a, b, true, 0.2)).unwrap()
    }

    #[test]
    fn test_projection_skips_most_violated_scenario() {
        let inst = instance();
        let bounder = LowerBounder::new(&inst, ProjectionMethod::RescaledMaxViolation);
        // x = 0.2 violates scenario 0 only.
        assert_eq!(bounder.select(&[0.2]), vec![1, 2, 3, 4]);

        let mut bounder = bounder;
        let lb = bounder
            .compute(&[0.2], f64::NEG_INFINITY, &GoodLpOracle::new(), &TimeBudget::unlimited())
            .unwrap();
        match lb {
            LowerBound::Bound { value, .. } => assert!((value - 0.2).abs() < 1e-6),
            LowerBound::NoBound => panic!("expected a bound"),
        }
    }

    #[test]
    fn test_counter_priority_and_cut() {
        let inst = instance();
        let mut bounder = LowerBounder::new(&inst, ProjectionMethod::Counter);
        bounder.record_feasibility(&inst.evaluate(&[0.15]));
        assert_eq!(bounder.priorities(&[]), vec![0.0, -1.0, -1.0, -1.0, -1.0]);
        assert_eq!(bounder.select(&[]), vec![1, 2, 3, 4]);

        let oracle = GoodLpOracle::new();
        let budget = TimeBudget::unlimited();
        // The projection cannot reach 0.3.
        let lb = bounder.compute(&[], 0.3, &oracle, &budget).unwrap();
        assert_eq!(lb, LowerBound::NoBound);
    }

    #[test]
    fn test_incumbent_heuristic() {
        let inst = instance();
        let candidates = vec![
            SubsetSolution { cost: 0.5, x: vec![0.5] },
            SubsetSolution { cost: 0.2, x: vec![0.2] },
            SubsetSolution { cost: 0.1, x: vec![0.1] },
        ];
        // 0.5 violates four scenarios; 0.2 violates one.
        let found = incumbent_heuristic(&inst, &candidates, f64::NEG_INFINITY, f64::INFINITY);
        assert_eq!(found, Some(LowerBound::Bound { x: vec![0.2], value: 0.2 }));
        assert_eq!(incumbent_heuristic(&inst, &candidates, 0.2, f64::INFINITY), None);
        assert_eq!(
            incumbent_heuristic(&inst, &[SubsetSolution::unknown()], f64::NEG_INFINITY, f64::INFINITY),
            None
        );
    }
}
