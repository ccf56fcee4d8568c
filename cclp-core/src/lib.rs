//! cclp-core: data model and solver seam for chance-constrained programs
//!
//! This crate holds everything the partitioning algorithm builds on:
//!
//! - **Instances**: [`ChanceInstance`], a finite-scenario chance-constrained
//!   linear/binary program, with scenario-level feasibility evaluation
//! - **Partitions**: [`Partition`], an arena of scenario subsets mutated by
//!   split, merge and compaction with an explicit [`IndexRemap`]
//! - **Views**: [`PartitionedView`], the subset-level instance induced by a
//!   partition; both levels implement [`ScenarioSet`]
//! - **Models**: [`LinearModel`], a solver-independent MILP builder with
//!   removable rows and indicator constraints
//! - **Oracle**: the [`Oracle`] trait and the [`GoodLpOracle`] backend
//!
//! # Problem
//!
//! ```text
//! maximize    c^T x
//! subject to  P[ A_s x <= b_s ] >= 1 - epsilon
//!             x in [lb, ub], integral where required
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cclp_core::{read_instance, GoodLpOracle};
//!
//! let instance = read_instance("data/knap-6-10-10.csv", true, 0.2)?;
//! println!("{} scenarios, at most {} violated",
//!     instance.nb_scenarios(), instance.tolerance_count());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod budget;
pub mod error;
pub mod instance;
pub mod loader;
pub mod model;
pub mod oracle;
pub mod partition;
pub mod util;
pub mod view;

pub use budget::TimeBudget;
pub use error::{CoreError, CoreResult};
pub use instance::{
    ChanceInstance, FeasibilityReport, InstanceData, ScenarioSet, VarType, VIOLATION_TOL,
};
pub use loader::{parse_instance, read_instance};
pub use model::{Cmp, Constraint, LinearModel, LinearRow, RowId, Sense, VarId, VarSpec};
pub use oracle::{BoundSample, GoodLpOracle, Oracle, OracleSolution, OracleStatus, SolveParams};
pub use partition::{IndexRemap, Partition};
pub use view::PartitionedView;
