//! Optimization oracle seam.
//!
//! The partitioning algorithm only talks to solvers through the [`Oracle`]
//! trait; [`GoodLpOracle`] is the bundled pure-Rust backend.

mod backend;
mod good_lp_backend;

pub use backend::{BoundSample, Oracle, OracleSolution, OracleStatus, SolveParams};
pub use good_lp_backend::GoodLpOracle;
