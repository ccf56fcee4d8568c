//! Oracle backend on top of `good_lp` with the pure-Rust `microlp` solver.
//!
//! `microlp` has no indicator constraints, lazy rows, start values or time
//! limits. Indicator rows are linearized with a big-M derived from the
//! variable bounds, hints and lazy flags are ignored, and a solve requested
//! with an exhausted time limit returns [`OracleStatus::TimeLimit`] without
//! touching the solver.

use std::time::Instant;

use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};

use super::{BoundSample, Oracle, OracleSolution, OracleStatus, SolveParams};
use crate::error::{CoreError, CoreResult};
use crate::model::{Cmp, Constraint, LinearModel, LinearRow, Sense, VarId};

/// Distance to the nearest integer below which integral values are snapped.
const INTEGRALITY_SNAP: f64 = 1e-6;

/// Linearized indicator rows whose big-M is at most this are dropped.
const REDUNDANT_M: f64 = 1e-9;

/// `good_lp` + `microlp` oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpOracle;

impl GoodLpOracle {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }

    fn expression(vars: &[Variable], terms: &[(VarId, f64)]) -> Expression {
        let mut expr = Expression::with_capacity(terms.len());
        for &(v, coef) in terms {
            if coef != 0.0 {
                expr.add_mul(coef, vars[v.index()]);
            }
        }
        expr
    }

    fn push_row(rows: &mut Vec<good_lp::Constraint>, expr: Expression, cmp: Cmp, rhs: f64) {
        match cmp {
            Cmp::Le => rows.push(constraint::leq(expr, rhs)),
            Cmp::Ge => rows.push(constraint::geq(expr, rhs)),
            Cmp::Eq => rows.push(constraint::eq(expr, rhs)),
        }
    }

    /// Rows equivalent to `indicator = 1 => row` over the variable box.
    fn linearize(
        model: &LinearModel,
        vars: &[Variable],
        indicator: VarId,
        row: &LinearRow,
        out: &mut Vec<good_lp::Constraint>,
    ) -> CoreResult<()> {
        let (lo, hi) = model.activity_range(&row.terms);
        let z = vars[indicator.index()];
        if matches!(row.cmp, Cmp::Le | Cmp::Eq) {
            // expr <= rhs + M (1 - z)
            let m = hi - row.rhs;
            if !m.is_finite() {
                return Err(CoreError::InvalidModel(format!(
                    "indicator row on {:?} has an unbounded activity",
                    indicator
                )));
            }
            if m > REDUNDANT_M {
                let mut expr = Self::expression(vars, &row.terms);
                expr.add_mul(m, z);
                Self::push_row(out, expr, Cmp::Le, row.rhs + m);
            }
        }
        if matches!(row.cmp, Cmp::Ge | Cmp::Eq) {
            // expr >= rhs - M (1 - z)
            let m = row.rhs - lo;
            if !m.is_finite() {
                return Err(CoreError::InvalidModel(format!(
                    "indicator row on {:?} has an unbounded activity",
                    indicator
                )));
            }
            if m > REDUNDANT_M {
                let mut expr = Self::expression(vars, &row.terms);
                expr.add_mul(-m, z);
                Self::push_row(out, expr, Cmp::Ge, row.rhs - m);
            }
        }
        Ok(())
    }
}

impl Oracle for GoodLpOracle {
    fn name(&self) -> &'static str {
        "good_lp/microlp"
    }

    fn solve(&self, model: &LinearModel, params: &SolveParams) -> CoreResult<OracleSolution> {
        let start = Instant::now();
        if params.time_limit.is_some_and(|t| t.is_zero()) {
            return Ok(OracleSolution::without_solution(
                OracleStatus::TimeLimit,
                model.sense(),
            ));
        }

        let mut problem_vars = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .vars()
            .iter()
            .map(|spec| {
                let mut def = variable().name(spec.name.clone());
                if spec.var_type.is_integral() {
                    def = def.integer();
                }
                if spec.lb.is_finite() {
                    def = def.min(spec.lb);
                }
                if spec.ub.is_finite() {
                    def = def.max(spec.ub);
                }
                problem_vars.add(def)
            })
            .collect();

        let mut rows = Vec::with_capacity(model.nb_rows());
        for (constraint, _lazy) in model.rows() {
            match constraint {
                Constraint::Linear(row) => {
                    let expr = Self::expression(&vars, &row.terms);
                    Self::push_row(&mut rows, expr, row.cmp, row.rhs);
                }
                Constraint::Indicator { indicator, row } => {
                    Self::linearize(model, &vars, *indicator, row, &mut rows)?;
                }
            }
        }

        let objective = Self::expression(&vars, model.objective());
        let mut problem = match model.sense() {
            Sense::Maximize => problem_vars.maximise(objective).using(microlp),
            Sense::Minimize => problem_vars.minimise(objective).using(microlp),
        };
        for row in rows {
            problem.add_constraint(row);
        }

        let status_only = |status| {
            let mut result = OracleSolution::without_solution(status, model.sense());
            result.solve_time = start.elapsed();
            result
        };

        match problem.solve() {
            Ok(solution) => {
                let x: Vec<f64> = model
                    .vars()
                    .iter()
                    .zip(&vars)
                    .map(|(spec, &var)| {
                        let value = solution.value(var);
                        let rounded = value.round();
                        if spec.var_type.is_integral() && (value - rounded).abs() <= INTEGRALITY_SNAP
                        {
                            rounded
                        } else {
                            value
                        }
                    })
                    .collect();
                let obj_val = model.objective_value(&x);
                let solve_time = start.elapsed();
                let trace = if params.record_trace {
                    vec![BoundSample {
                        elapsed: (params.trace_offset + solve_time).as_secs_f64(),
                        incumbent: obj_val,
                        bound: obj_val,
                    }]
                } else {
                    Vec::new()
                };
                log::debug!(
                    "{}: solved {} ({} vars, {} rows) in {:.3}s, obj = {obj_val}",
                    self.name(),
                    model.name(),
                    model.nb_vars(),
                    model.nb_rows(),
                    solve_time.as_secs_f64()
                );
                Ok(OracleSolution {
                    status: OracleStatus::Optimal,
                    x,
                    obj_val,
                    bound: obj_val,
                    solve_time,
                    trace,
                })
            }
            Err(ResolutionError::Infeasible) => Ok(status_only(OracleStatus::Infeasible)),
            Err(ResolutionError::Unbounded) => Ok(status_only(OracleStatus::Unbounded)),
            Err(other) => Err(CoreError::Oracle(format!("{}: {other}", model.name()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarSpec;

    fn solve(model: &LinearModel) -> OracleSolution {
        GoodLpOracle::new()
            .solve(model, &SolveParams::default())
            .unwrap()
    }

    #[test]
    fn test_fractional_lp() {
        let mut model = LinearModel::new("lp", Sense::Maximize);
        let x = model.add_vars("x", 2, |n| VarSpec::continuous(n, 0.0, 1.0));
        model.set_objective(Sense::Maximize, vec![(x[0], 3.0), (x[1], 2.0)], 0.0);
        model.add_row(vec![(x[0], 2.0), (x[1], 2.0)], Cmp::Le, 3.0);
        let sol = solve(&model);
        assert!(sol.is_optimal());
        assert!((sol.obj_val - 4.0).abs() < 1e-6);
        assert!((sol.x[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_binary_knapsack() {
        let mut model = LinearModel::new("knap", Sense::Maximize);
        let x = model.add_vars("x", 3, VarSpec::binary);
        model.set_objective(Sense::Maximize, vec![(x[0], 5.0), (x[1], 4.0), (x[2], 3.0)], 0.0);
        model.add_row(vec![(x[0], 4.0), (x[1], 3.0), (x[2], 2.0)], Cmp::Le, 5.0);
        let sol = solve(&model);
        assert!((sol.obj_val - 7.0).abs() < 1e-6);
        assert_eq!(sol.x, vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_indicator_rows_are_enforced_only_when_on() {
        let mut model = LinearModel::new("ind", Sense::Maximize);
        let x = model.add_var(VarSpec::continuous("x", 0.0, 1.0));
        let z = model.add_vars("z", 2, VarSpec::binary);
        model.set_objective(Sense::Maximize, vec![(x, 1.0)], 0.0);
        model.add_indicator(z[0], vec![(x, 1.0)], Cmp::Le, 0.25).unwrap();
        model.add_indicator(z[1], vec![(x, 1.0)], Cmp::Le, 0.75).unwrap();
        model.add_row(vec![(z[0], 1.0), (z[1], 1.0)], Cmp::Ge, 1.0);
        let sol = solve(&model);
        assert!((sol.obj_val - 0.75).abs() < 1e-6);

        model.fix_var(z[1], 0.0);
        let sol = solve(&model);
        assert!((sol.obj_val - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_and_removed_rows() {
        let mut model = LinearModel::new("inf", Sense::Minimize);
        let x = model.add_var(VarSpec::continuous("x", 0.0, 1.0));
        model.set_objective(Sense::Minimize, vec![(x, 1.0)], 0.0);
        let row = model.add_row(vec![(x, 1.0)], Cmp::Ge, 2.0);
        assert_eq!(solve(&model).status, OracleStatus::Infeasible);
        model.remove_row(row);
        let sol = solve(&model);
        assert!(sol.is_optimal());
        assert!(sol.obj_val.abs() < 1e-9);
    }

    #[test]
    fn test_exhausted_time_limit_skips_solve() {
        let mut model = LinearModel::new("late", Sense::Maximize);
        let x = model.add_var(VarSpec::continuous("x", 0.0, 1.0));
        model.set_objective(Sense::Maximize, vec![(x, 1.0)], 0.0);
        let params = SolveParams::default().with_time_limit(std::time::Duration::ZERO);
        let sol = GoodLpOracle::new().solve(&model, &params).unwrap();
        assert_eq!(sol.status, OracleStatus::TimeLimit);
        assert!(!sol.has_solution());
        assert_eq!(sol.bound, f64::INFINITY);
    }
}
