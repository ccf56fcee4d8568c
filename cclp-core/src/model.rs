//! Solver-independent linear model.
//!
//! Models are assembled once and then edited in place: rows live in a slot
//! arena so that they can be removed and re-added without invalidating the
//! handles of other rows, which is what incremental relaxations need.

use crate::error::{CoreError, CoreResult};
use crate::instance::VarType;

/// Handle to a model variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    /// Position of the variable in the model.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a model row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId(usize);

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    /// Maximize the objective.
    #[default]
    Maximize,
    /// Minimize the objective.
    Minimize,
}

/// Row comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// `expr <= rhs`
    Le,
    /// `expr >= rhs`
    Ge,
    /// `expr == rhs`
    Eq,
}

/// Variable definition.
#[derive(Debug, Clone)]
pub struct VarSpec {
    /// Lower bound (may be `-inf`).
    pub lb: f64,
    /// Upper bound (may be `+inf`).
    pub ub: f64,
    /// Domain.
    pub var_type: VarType,
    /// Name used in diagnostics.
    pub name: String,
}

impl VarSpec {
    /// Continuous variable on `[lb, ub]`.
    pub fn continuous(name: impl Into<String>, lb: f64, ub: f64) -> Self {
        Self {
            lb,
            ub,
            var_type: VarType::Continuous,
            name: name.into(),
        }
    }

    /// Binary variable.
    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            lb: 0.0,
            ub: 1.0,
            var_type: VarType::Binary,
            name: name.into(),
        }
    }

    /// Variable of the given type and bounds.
    pub fn typed(name: impl Into<String>, var_type: VarType, lb: f64, ub: f64) -> Self {
        Self {
            lb,
            ub,
            var_type,
            name: name.into(),
        }
    }
}

/// Linear row `sum terms cmp rhs`.
#[derive(Debug, Clone)]
pub struct LinearRow {
    /// Non-zero coefficients.
    pub terms: Vec<(VarId, f64)>,
    /// Comparison.
    pub cmp: Cmp,
    /// Right-hand side.
    pub rhs: f64,
}

/// Row stored in the model.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Always-active row.
    Linear(LinearRow),
    /// Row enforced only when `indicator` equals one.
    Indicator {
        /// Binary switch.
        indicator: VarId,
        /// Guarded row.
        row: LinearRow,
    },
}

#[derive(Debug, Clone)]
struct Slot {
    constraint: Constraint,
    lazy: bool,
}

/// Linear / mixed-integer model handed to an [`crate::Oracle`].
#[derive(Debug, Clone, Default)]
pub struct LinearModel {
    name: String,
    sense: Sense,
    vars: Vec<VarSpec>,
    objective: Vec<(VarId, f64)>,
    objective_constant: f64,
    slots: Vec<Option<Slot>>,
    hints: Vec<(VarId, f64)>,
}

impl LinearModel {
    /// Empty model.
    pub fn new(name: impl Into<String>, sense: Sense) -> Self {
        Self {
            name: name.into(),
            sense,
            ..Default::default()
        }
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optimization direction.
    pub fn sense(&self) -> Sense {
        self.sense
    }

    /// Add one variable.
    pub fn add_var(&mut self, spec: VarSpec) -> VarId {
        self.vars.push(spec);
        VarId(self.vars.len() - 1)
    }

    /// Add `count` variables named `prefix[k]`, built by `make`.
    pub fn add_vars(
        &mut self,
        prefix: &str,
        count: usize,
        make: impl Fn(String) -> VarSpec,
    ) -> Vec<VarId> {
        (0..count)
            .map(|k| self.add_var(make(format!("{prefix}[{k}]"))))
            .collect()
    }

    /// Variable definitions in index order.
    pub fn vars(&self) -> &[VarSpec] {
        &self.vars
    }

    /// Number of variables.
    pub fn nb_vars(&self) -> usize {
        self.vars.len()
    }

    /// Replace the objective.
    pub fn set_objective(&mut self, sense: Sense, terms: Vec<(VarId, f64)>, constant: f64) {
        self.sense = sense;
        self.objective = terms;
        self.objective_constant = constant;
    }

    /// Objective terms.
    pub fn objective(&self) -> &[(VarId, f64)] {
        &self.objective
    }

    /// Objective constant.
    pub fn objective_constant(&self) -> f64 {
        self.objective_constant
    }

    /// Evaluate the objective at `x`.
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.objective_constant
            + self
                .objective
                .iter()
                .map(|&(v, coef)| coef * x[v.0])
                .sum::<f64>()
    }

    fn push(&mut self, constraint: Constraint) -> RowId {
        self.slots.push(Some(Slot {
            constraint,
            lazy: false,
        }));
        RowId(self.slots.len() - 1)
    }

    /// Add an always-active row.
    pub fn add_row(&mut self, terms: Vec<(VarId, f64)>, cmp: Cmp, rhs: f64) -> RowId {
        self.push(Constraint::Linear(LinearRow { terms, cmp, rhs }))
    }

    /// Add a row enforced only when `indicator == 1`.
    pub fn add_indicator(
        &mut self,
        indicator: VarId,
        terms: Vec<(VarId, f64)>,
        cmp: Cmp,
        rhs: f64,
    ) -> CoreResult<RowId> {
        if self.vars[indicator.0].var_type == VarType::Continuous {
            return Err(CoreError::InvalidModel(format!(
                "indicator {} must be integral",
                self.vars[indicator.0].name
            )));
        }
        Ok(self.push(Constraint::Indicator {
            indicator,
            row: LinearRow { terms, cmp, rhs },
        }))
    }

    /// Flag a row as lazy. Backends without lazy rows treat it as ordinary.
    pub fn set_lazy(&mut self, row: RowId) {
        if let Some(Some(slot)) = self.slots.get_mut(row.0) {
            slot.lazy = true;
        }
    }

    /// Remove a row. Returns false if it was already removed.
    pub fn remove_row(&mut self, row: RowId) -> bool {
        self.slots
            .get_mut(row.0)
            .map(|slot| slot.take().is_some())
            .unwrap_or(false)
    }

    /// Active rows with their lazy flag.
    pub fn rows(&self) -> impl Iterator<Item = (&Constraint, bool)> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| (&slot.constraint, slot.lazy))
    }

    /// Number of active rows.
    pub fn nb_rows(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Number of active rows flagged lazy.
    pub fn nb_lazy_rows(&self) -> usize {
        self.slots.iter().flatten().filter(|s| s.lazy).count()
    }

    /// Fix a variable to `value` by collapsing its bounds.
    pub fn fix_var(&mut self, var: VarId, value: f64) {
        let spec = &mut self.vars[var.0];
        spec.lb = value;
        spec.ub = value;
    }

    /// Record a start value for `var`.
    pub fn set_hint(&mut self, var: VarId, value: f64) {
        self.hints.retain(|(v, _)| *v != var);
        self.hints.push((var, value));
    }

    /// Start values.
    pub fn hints(&self) -> &[(VarId, f64)] {
        &self.hints
    }

    /// Range of `sum terms` over the variable box.
    pub fn activity_range(&self, terms: &[(VarId, f64)]) -> (f64, f64) {
        let mut lo = 0.0;
        let mut hi = 0.0;
        for &(v, coef) in terms {
            let spec = &self.vars[v.0];
            if coef >= 0.0 {
                lo += coef * spec.lb;
                hi += coef * spec.ub;
            } else {
                lo += coef * spec.ub;
                hi += coef * spec.lb;
            }
        }
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_can_be_removed_and_readded() {
        let mut model = LinearModel::new("t", Sense::Maximize);
        let x = model.add_vars("x", 2, |n| VarSpec::continuous(n, 0.0, 1.0));
        let r0 = model.add_row(vec![(x[0], 1.0)], Cmp::Le, 0.5);
        let r1 = model.add_row(vec![(x[1], 1.0)], Cmp::Le, 0.5);
        assert_eq!(model.nb_rows(), 2);
        assert!(model.remove_row(r0));
        assert!(!model.remove_row(r0));
        assert_eq!(model.nb_rows(), 1);
        model.set_lazy(r1);
        assert_eq!(model.nb_lazy_rows(), 1);
        model.add_row(vec![(x[0], 1.0)], Cmp::Le, 0.25);
        assert_eq!(model.nb_rows(), 2);
    }

    #[test]
    fn test_activity_range_and_fixing() {
        let mut model = LinearModel::new("t", Sense::Maximize);
        let x = model.add_vars("x", 2, |n| VarSpec::continuous(n, 0.0, 1.0));
        assert_eq!(model.activity_range(&[(x[0], 2.0), (x[1], -3.0)]), (-3.0, 2.0));
        model.fix_var(x[1], 0.0);
        assert_eq!(model.activity_range(&[(x[0], 2.0), (x[1], -3.0)]), (0.0, 2.0));
    }

    #[test]
    fn test_indicator_requires_integral_switch() {
        let mut model = LinearModel::new("t", Sense::Maximize);
        let x = model.add_var(VarSpec::continuous("x", 0.0, 1.0));
        let z = model.add_var(VarSpec::binary("z"));
        assert!(model.add_indicator(x, vec![(x, 1.0)], Cmp::Le, 0.0).is_err());
        assert!(model.add_indicator(z, vec![(x, 1.0)], Cmp::Le, 0.0).is_ok());
    }
}
