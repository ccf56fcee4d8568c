//! Optimization models built over a [`ScenarioSet`].
//!
//! Every model owns a [`LinearModel`] and hands it to an [`cclp_core::Oracle`];
//! none of them talks to a solver directly.

mod accurate_split;
mod big_m_knapsack;
mod cclp;
mod deterministic;

pub use accurate_split::{AccurateSplit, AccurateSplitModel};
pub use big_m_knapsack::BigMKnapsackModel;
pub use cclp::{CclpModel, CclpSolution};
pub use deterministic::DeterministicModel;

use cclp_core::{LinearModel, ScenarioSet, VarId, VarSpec};

/// Add the decision variables `x` of `set` to `model`.
pub(crate) fn decision_vars<S: ScenarioSet + ?Sized>(model: &mut LinearModel, set: &S) -> Vec<VarId> {
    (0..set.nb_vars())
        .map(|j| {
            model.add_var(VarSpec::typed(
                format!("x[{j}]"),
                set.var_types()[j],
                set.var_lb()[j],
                set.var_ub()[j],
            ))
        })
        .collect()
}

/// Pair coefficients with variables, dropping zeros.
pub(crate) fn terms(vars: &[VarId], coefs: &[f64]) -> Vec<(VarId, f64)> {
    vars.iter()
        .zip(coefs)
        .filter(|(_, &a)| a != 0.0)
        .map(|(&v, &a)| (v, a))
        .collect()
}
