//! cclp-partition: adaptive scenario partitioning for chance-constrained programs
//!
//! The exact extended formulation of a chance-constrained program carries one
//! binary indicator and one big-M block per scenario. This crate solves the
//! problem over a partition of the scenarios instead, refining and
//! coarsening the partition until the bounds meet:
//!
//! - [`AdaptivePartitioner`]: the iterative scheme, configured by
//!   [`AdaptiveSettings`]
//! - [`MilpSolver`]: the extended formulation, as a baseline
//! - [`big_m`]: naive, objective-bounded and pairwise-scenario big-M values
//! - [`refiner`] and [`merger`]: partition split and merge
//! - [`lower_bound`] and [`upper_bound`]: the bounding steps
//!
//! # Example
//!
//! ```ignore
//! use cclp_core::{read_instance, GoodLpOracle};
//! use cclp_partition::{AdaptivePartitioner, AdaptiveSettings, InitialPartition, SplitMethod};
//!
//! let instance = read_instance("data/knap-6-10-10.csv", true, 0.2)?;
//! let oracle = GoodLpOracle::new();
//! let settings = AdaptiveSettings::default()
//!     .with_strategy(InitialPartition::Cost, SplitMethod::Cost)
//!     .with_merger(true)
//!     .with_time_limit(60.0);
//! let summary = AdaptivePartitioner::new(&instance, &oracle, settings)?.solve()?;
//! println!("{}: [{}, {}]", summary.status, summary.bounds.lower, summary.bounds.upper);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adaptive;
pub mod big_m;
pub mod bounds;
pub mod error;
pub mod evaluator;
pub mod informer;
pub mod initializer;
pub mod lower_bound;
pub mod merger;
pub mod milp;
pub mod models;
pub mod refiner;
pub mod settings;
pub mod upper_bound;
pub mod warmstart;

pub use adaptive::{AdaptivePartitioner, AdaptiveStatus, AdaptiveSummary};
pub use big_m::{BigMFinder, BigMTable};
pub use bounds::BoundState;
pub use error::{PartitionError, PartitionResult};
pub use evaluator::{Evaluator, SubsetSolution};
pub use informer::{method_codes, Informer, IterationRecord};
pub use initializer::{create_first_partition, FirstPartition};
pub use lower_bound::{LowerBound, LowerBounder};
pub use merger::{merge_all, merge_feasible, MergeOutcome};
pub use milp::{MilpSolver, MilpSummary};
pub use refiner::{RefineOutcome, Refiner, SplitOrder};
pub use settings::{
    AdaptiveSettings, BigMMethod, InitialPartition, MilpSettings, ProjectionMethod, SplitMethod,
};
pub use upper_bound::{ahmed_bound, UpperBound, UpperBounder};
