//! Extended formulation with one indicator per scenario.
//!
//! This is the baseline the adaptive partitioner is measured against: the
//! whole problem is handed to the oracle at once.

use serde::Serialize;

use cclp_core::{BoundSample, ChanceInstance, Oracle, OracleStatus, ScenarioSet, SolveParams};

use crate::big_m::BigMFinder;
use crate::bounds::BoundState;
use crate::error::{PartitionError, PartitionResult};
use crate::evaluator::Evaluator;
use crate::models::CclpModel;
use crate::settings::{BigMMethod, MilpSettings};
use crate::upper_bound::ahmed_bound;

/// Result of [`MilpSolver::solve`].
#[derive(Debug, Clone, Serialize)]
pub struct MilpSummary {
    /// Oracle status.
    pub status: OracleStatus,
    /// `vLB` is the objective of the returned point, `vUB` the oracle bound.
    pub bounds: BoundState,
    /// Scenario indicators of the returned point.
    pub z: Vec<f64>,
    /// Relative gap.
    pub gap: f64,
    /// Big-M method, `None` for indicator rows.
    pub big_m_method: Option<String>,
    /// Seconds spent computing big-M values.
    pub big_m_time: f64,
    /// Wall time in seconds.
    pub elapsed: f64,
    /// Oracle bound trace, when recorded.
    pub trace: Vec<BoundSample>,
}

/// Solves the extended formulation.
pub struct MilpSolver<'a> {
    instance: &'a ChanceInstance,
    oracle: &'a dyn Oracle,
    settings: MilpSettings,
}

impl<'a> MilpSolver<'a> {
    /// Solver over `instance`.
    pub fn new(instance: &'a ChanceInstance, oracle: &'a dyn Oracle, settings: MilpSettings) -> Self {
        Self {
            instance,
            oracle,
            settings,
        }
    }

    /// Compute big-M values if requested, then solve.
    pub fn solve(&self) -> PartitionResult<MilpSummary> {
        let mut budget = self.settings.budget();
        let mut finder = BigMFinder::new();
        if let Some(method) = self.settings.big_m_method {
            let upper_bound = match method {
                BigMMethod::Belotti => {
                    let costs: Vec<f64> = Evaluator::new(self.instance, self.oracle, &budget)
                        .scenario_costs()?
                        .into_iter()
                        .map(|c| c.cost)
                        .collect();
                    ahmed_bound(&costs, self.instance.probabilities(), self.instance.epsilon())
                }
                BigMMethod::Naive | BigMMethod::Song => f64::INFINITY,
            };
            finder.update_scenarios(self.instance, upper_bound, method, self.oracle, &budget)?;
        }
        let big_m_time = budget.elapsed().as_secs_f64();
        log::info!("Big-M values ready in {big_m_time:.3}s");

        let table = self.settings.big_m_method.map(|_| finder.table());
        let model = CclpModel::build(self.instance, table, false)?;
        let mut params = SolveParams::default()
            .with_mip_gap(self.settings.gap_tol)
            .with_time_limit(budget.remaining());
        if self.settings.record_trace {
            params = params.with_trace(budget.elapsed());
        }
        let sol = model.solve(self.oracle, &params)?;
        budget.finish();

        let mut bounds = BoundState::default();
        match sol.status {
            OracleStatus::Optimal | OracleStatus::TimeLimit => {
                if sol.has_solution() {
                    bounds.offer_lower(&sol.x, sol.obj_val);
                }
                bounds.upper = sol.bound;
            }
            status => {
                return Err(PartitionError::oracle(model.model().name(), format!("{status:?}")))
            }
        }
        log::info!(
            "Extended formulation: {:?}, vLB {:.6}, vUB {:.6} in {:.2}s",
            sol.status,
            bounds.lower,
            bounds.upper,
            budget.elapsed().as_secs_f64()
        );
        Ok(MilpSummary {
            status: sol.status,
            gap: bounds.gap(),
            bounds,
            z: sol.z,
            big_m_method: self.settings.big_m_method.map(|m| m.to_string()),
            big_m_time,
            elapsed: budget.elapsed().as_secs_f64(),
            trace: sol.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{GoodLpOracle, InstanceData};

    #[test]
    fn test_big_m_methods_agree_with_indicators() {
        let a = (0..5)
            .map(|s| vec![vec![1.0, 0.5 + 0.2 * s as f64]])
            .collect();
        let b = vec![vec![1.0]; 5];
        let inst = ChanceInstance::new(InstanceData::unit_box("milp", vec![1.0, 1.0], a, b, true, 0.2))
            .unwrap();
        let oracle = GoodLpOracle::new();
        let reference = MilpSolver::new(&inst, &oracle, MilpSettings::default().with_big_m(None))
            .solve()
            .unwrap();
        assert_eq!(reference.status, OracleStatus::Optimal);
        for method in [BigMMethod::Naive, BigMMethod::Belotti, BigMMethod::Song] {
            let summary = MilpSolver::new(&inst, &oracle, MilpSettings::default().with_big_m(Some(method)).with_trace())
                .solve()
                .unwrap();
            assert!((summary.bounds.lower - reference.bounds.lower).abs() < 1e-5, "{method}");
            assert!(inst.is_feasible(&summary.bounds.x_lower));
            assert_eq!(summary.z.len(), 5);
        }
    }
}
