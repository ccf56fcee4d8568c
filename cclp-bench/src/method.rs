use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use cclp_core::{ChanceInstance, Oracle};
use cclp_partition::{
    AdaptivePartitioner, AdaptiveSettings, AdaptiveSummary, BigMMethod, InitialPartition,
    MilpSettings, MilpSolver, MilpSummary, SplitMethod,
};

/// Benchmarked solution methods.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Extended formulation with pairwise-scenario big-M values.
    #[value(name = "1")]
    ExactSong,
    /// Extended formulation with objective-bounded big-M values.
    #[value(name = "2")]
    ExactBelotti,
    /// Adaptive partitioning, random partitions and splits, no merging.
    #[value(name = "3")]
    AdaptiveRandom,
    /// Adaptive partitioning, cost partitions, accurate splits and merging.
    #[value(name = "4")]
    AdaptiveCost,
}

impl Method {
    /// Number used on the command line and in output names.
    pub fn number(self) -> u8 {
        match self {
            Method::ExactSong => 1,
            Method::ExactBelotti => 2,
            Method::AdaptiveRandom => 3,
            Method::AdaptiveCost => 4,
        }
    }
}

/// Options shared by every method.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    pub time_limit: f64,
    pub gap: f64,
    pub seed: u64,
    pub verbose: bool,
}

/// Settings and summary of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Adaptive {
        #[serde(skip)]
        settings: AdaptiveSettings,
        summary: AdaptiveSummary,
    },
    Exact {
        #[serde(skip)]
        settings: MilpSettings,
        summary: MilpSummary,
    },
}

impl RunOutcome {
    /// Whether big-M rows were used.
    pub fn uses_big_m(&self) -> bool {
        match self {
            RunOutcome::Adaptive { settings, .. } => settings.use_big_m,
            RunOutcome::Exact { settings, .. } => settings.big_m_method.is_some(),
        }
    }

    /// Final `(elapsed, vLB, vUB, gap)`.
    pub fn totals(&self) -> (f64, f64, f64, f64) {
        match self {
            RunOutcome::Adaptive { summary, .. } => (
                summary.elapsed,
                summary.bounds.lower,
                summary.bounds.upper,
                summary.gap,
            ),
            RunOutcome::Exact { summary, .. } => (
                summary.elapsed,
                summary.bounds.lower,
                summary.bounds.upper,
                summary.gap,
            ),
        }
    }
}

pub fn adaptive_settings(method: Method, config: &RunConfig) -> Option<AdaptiveSettings> {
    let base = AdaptiveSettings {
        verbose: config.verbose,
        ..AdaptiveSettings::default()
    }
    .with_time_limit(config.time_limit)
    .with_gap_tol(config.gap)
    .with_seed(config.seed)
    .with_big_m(Some(BigMMethod::Belotti));
    match method {
        Method::AdaptiveRandom => Some(
            base.with_strategy(InitialPartition::Random, SplitMethod::Random)
                .with_merger(false),
        ),
        Method::AdaptiveCost => {
            let mut settings = base
                .with_strategy(InitialPartition::Cost, SplitMethod::Cost)
                .with_merger(true);
            settings.use_lazy = true;
            Some(settings)
        }
        Method::ExactSong | Method::ExactBelotti => None,
    }
}

pub fn milp_settings(method: Method, config: &RunConfig) -> Option<MilpSettings> {
    let big_m = match method {
        Method::ExactSong => BigMMethod::Song,
        Method::ExactBelotti => BigMMethod::Belotti,
        Method::AdaptiveRandom | Method::AdaptiveCost => return None,
    };
    Some(
        MilpSettings::default()
            .with_time_limit(config.time_limit)
            .with_gap_tol(config.gap)
            .with_big_m(Some(big_m))
            .with_trace(),
    )
}

pub fn run(
    instance: &ChanceInstance,
    oracle: &dyn Oracle,
    method: Method,
    config: &RunConfig,
) -> Result<RunOutcome> {
    if let Some(settings) = adaptive_settings(method, config) {
        let summary = AdaptivePartitioner::new(instance, oracle, settings.clone())
            .and_then(|solver| solver.solve())
            .with_context(|| format!("Adaptive partitioning failed on {}", instance.name()))?;
        return Ok(RunOutcome::Adaptive { settings, summary });
    }
    let settings = milp_settings(method, config)
        .with_context(|| format!("No settings for method {}", method.number()))?;
    let summary = MilpSolver::new(instance, oracle, settings.clone())
        .solve()
        .with_context(|| format!("Extended formulation failed on {}", instance.name()))?;
    Ok(RunOutcome::Exact { settings, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_partition::ProjectionMethod;

    fn config() -> RunConfig {
        RunConfig {
            time_limit: 60.0,
            gap: 1e-4,
            seed: 421,
            verbose: false,
        }
    }

    #[test]
    fn test_method_settings() {
        let random = adaptive_settings(Method::AdaptiveRandom, &config()).unwrap();
        assert_eq!(random.split_method, SplitMethod::Random);
        assert!(!random.use_merger);
        assert_eq!(random.projection_method, ProjectionMethod::RescaledMaxViolation);

        let cost = adaptive_settings(Method::AdaptiveCost, &config()).unwrap();
        assert!(cost.use_accurate_split && cost.use_merger && cost.use_lazy);
        assert_eq!(cost.initial_partition, InitialPartition::Cost);
        assert_eq!(cost.time_limit_ms, Some(60_000));

        assert!(adaptive_settings(Method::ExactSong, &config()).is_none());
        let song = milp_settings(Method::ExactSong, &config()).unwrap();
        assert_eq!(song.big_m_method, Some(BigMMethod::Song));
        assert!(song.record_trace);
    }

    #[test]
    fn test_method_values_parse() {
        assert_eq!(Method::from_str("2", false).unwrap(), Method::ExactBelotti);
        assert_eq!(Method::AdaptiveCost.number(), 4);
    }
}
