//! Configuration settings for the adaptive partitioner and the exact solver.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use cclp_core::TimeBudget;

use crate::error::{PartitionError, PartitionResult};

/// How the first partition is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialPartition {
    /// Shuffle scenarios and deal them round-robin.
    Random,

    /// Sort scenarios by decreasing single-scenario cost and deal them
    /// round-robin; also yields the quantile upper bound.
    #[default]
    Cost,
}

/// How subsets are chosen for refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMethod {
    /// Visit subsets in random order and split scenarios at random.
    #[default]
    Random,

    /// Visit subsets by increasing cost, split with the accurate model.
    Cost,
}

/// Scenario priority used by the lower-bound projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMethod {
    /// Prefer scenarios that were satisfied most often.
    Counter,

    /// Prefer scenarios least violated by the last upper-bound solution.
    #[default]
    RescaledMaxViolation,
}

/// Big-M tightening method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BigMMethod {
    /// Row sum minus right-hand side.
    Naive,

    /// Objective-bounded maximum violation (knapsack per row).
    #[default]
    Belotti,

    /// Quantile of pairwise scenario violations.
    Song,
}

macro_rules! named_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Name used in configuration strings and output files.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = PartitionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(PartitionError::Config(format!(
                        concat!("unknown ", $what, " '{}', expected one of: {}"),
                        other,
                        [$($name),+].join(", ")
                    ))),
                }
            }
        }
    };
}

named_enum!(InitialPartition, "initial partition", {
    Random => "random",
    Cost => "cost",
});

named_enum!(SplitMethod, "split method", {
    Random => "random",
    Cost => "cost",
});

named_enum!(ProjectionMethod, "projection method", {
    Counter => "counter",
    RescaledMaxViolation => "rescaled_max_violation",
});

named_enum!(BigMMethod, "big-M method", {
    Naive => "naive",
    Belotti => "belotti",
    Song => "song",
});

/// Adaptive partitioner settings.
#[derive(Debug, Clone)]
pub struct AdaptiveSettings {
    // === Partitioning ===
    /// How the first partition is built.
    pub initial_partition: InitialPartition,

    /// How subsets are chosen for refinement.
    pub split_method: SplitMethod,

    /// Split with the accurate-objective model (required by cost splits).
    pub use_accurate_split: bool,

    /// Scenario priority of the lower-bound projection.
    pub projection_method: ProjectionMethod,

    /// Merge subsets after refinement when the new costs allow it.
    pub use_merger: bool,

    // === Partitioned model ===
    /// Linearize indicator rows with big-M values (native indicators otherwise).
    pub use_big_m: bool,

    /// Big-M tightening method.
    pub big_m_method: BigMMethod,

    /// Flag big-M rows as lazy.
    pub use_lazy: bool,

    // === Termination criteria ===
    /// Time limit in milliseconds (None = unlimited).
    pub time_limit_ms: Option<u64>,

    /// Relative gap `(vUB - vLB) / vLB` at which the run stops.
    pub gap_tol: f64,

    // === Reproducibility ===
    /// Seed of the random number generator.
    pub seed: u64,

    // === Output ===
    /// Log per-subset detail.
    pub verbose: bool,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            // Partitioning
            initial_partition: InitialPartition::default(),
            split_method: SplitMethod::default(),
            use_accurate_split: false,
            projection_method: ProjectionMethod::default(),
            use_merger: false,

            // Partitioned model
            use_big_m: true,
            big_m_method: BigMMethod::default(),
            use_lazy: false,

            // Termination
            time_limit_ms: None,
            gap_tol: 1e-4,

            // Reproducibility
            seed: 421,

            // Output
            verbose: false,
        }
    }
}

impl AdaptiveSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    /// Set time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_ms = Some((seconds * 1000.0) as u64);
        self
    }

    /// Set optimality gap tolerance.
    pub fn with_gap_tol(mut self, tol: f64) -> Self {
        self.gap_tol = tol;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the initial partition and split method.
    pub fn with_strategy(mut self, initial: InitialPartition, split: SplitMethod) -> Self {
        self.initial_partition = initial;
        self.split_method = split;
        if split == SplitMethod::Cost {
            self.use_accurate_split = true;
        }
        self
    }

    /// Set the big-M method (`None` = native indicator rows).
    pub fn with_big_m(mut self, method: Option<BigMMethod>) -> Self {
        self.use_big_m = method.is_some();
        if let Some(method) = method {
            self.big_m_method = method;
        }
        self
    }

    /// Enable or disable merging.
    pub fn with_merger(mut self, enabled: bool) -> Self {
        self.use_merger = enabled;
        self
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> PartitionResult<()> {
        if self.split_method == SplitMethod::Cost && !self.use_accurate_split {
            return Err(PartitionError::Config(
                "cost-based splitting requires the accurate split".into(),
            ));
        }
        if !(self.gap_tol >= 0.0) {
            return Err(PartitionError::Config(format!(
                "gap tolerance must be non-negative, got {}",
                self.gap_tol
            )));
        }
        Ok(())
    }

    /// Start a time budget matching the configured limit.
    pub fn budget(&self) -> TimeBudget {
        budget_from_ms(self.time_limit_ms)
    }
}

/// Exact extended-formulation solver settings.
#[derive(Debug, Clone)]
pub struct MilpSettings {
    // === Model ===
    /// Big-M method (None = native indicator rows).
    pub big_m_method: Option<BigMMethod>,

    // === Termination criteria ===
    /// Time limit in milliseconds (None = unlimited).
    pub time_limit_ms: Option<u64>,

    /// Relative MIP gap passed to the oracle.
    pub gap_tol: f64,

    // === Output ===
    /// Record the oracle's bound trace.
    pub record_trace: bool,
}

impl Default for MilpSettings {
    fn default() -> Self {
        Self {
            big_m_method: Some(BigMMethod::Belotti),
            time_limit_ms: None,
            gap_tol: 1e-4,
            record_trace: false,
        }
    }
}

impl MilpSettings {
    /// Set time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_ms = Some((seconds * 1000.0) as u64);
        self
    }

    /// Set optimality gap tolerance.
    pub fn with_gap_tol(mut self, tol: f64) -> Self {
        self.gap_tol = tol;
        self
    }

    /// Set the big-M method (`None` = native indicator rows).
    pub fn with_big_m(mut self, method: Option<BigMMethod>) -> Self {
        self.big_m_method = method;
        self
    }

    /// Record the bound trace.
    pub fn with_trace(mut self) -> Self {
        self.record_trace = true;
        self
    }

    /// Start a time budget matching the configured limit.
    pub fn budget(&self) -> TimeBudget {
        budget_from_ms(self.time_limit_ms)
    }
}

fn budget_from_ms(limit: Option<u64>) -> TimeBudget {
    match limit {
        Some(ms) => TimeBudget::new(Duration::from_millis(ms)),
        None => TimeBudget::unlimited(),
    }
}
