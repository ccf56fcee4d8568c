//! Benchmark CLI: solve one instance with one method and write the results.
//!
//! ```text
//! cclp-bench data/knap-6-10-10.csv --continuous --epsilon 0.2 --method 4 --output out/
//! ```
//!
//! Writes `<output><name>-<eps%>-<1|0>-<method>.csv` with one summary row and
//! `...-iter.csv` with the per-iteration bounds (or the oracle bound trace
//! for the exact methods).

mod method;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use cclp_core::{read_instance, GoodLpOracle, ScenarioSet};

use crate::method::{Method, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "cclp-bench", about = "Adaptive partitioning for chance-constrained programs")]
struct Cli {
    /// Instance file
    instance: PathBuf,

    /// Relax the decision variables to [0, 1]
    #[arg(long)]
    continuous: bool,

    /// Chance tolerance
    #[arg(long, default_value_t = 0.2)]
    epsilon: f64,

    /// 1: extended/Song, 2: extended/Belotti, 3: adaptive random, 4: adaptive cost
    #[arg(long, value_enum, default_value = "4")]
    method: Method,

    /// Output prefix (directory with trailing slash)
    #[arg(long, default_value = "./")]
    output: String,

    /// Wall-clock limit in seconds
    #[arg(long, default_value_t = 3600.0)]
    time_limit: f64,

    /// Relative optimality gap
    #[arg(long, default_value_t = 1e-4)]
    gap: f64,

    /// Random seed for the adaptive methods
    #[arg(long, default_value_t = 421)]
    seed: u64,

    /// Also write a JSON summary
    #[arg(long)]
    json: bool,

    /// Per-iteration logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let instance = read_instance(&cli.instance, cli.continuous, cli.epsilon)
        .with_context(|| format!("Failed to read instance {}", cli.instance.display()))?;
    log::info!(
        "{}: n = {}, m = {}, N = {}, epsilon = {}, continuous = {}",
        instance.name(),
        instance.nb_vars(),
        instance.nb_constraints(),
        instance.nb_scenarios(),
        instance.epsilon(),
        instance.is_continuous()
    );

    let config = RunConfig {
        time_limit: cli.time_limit,
        gap: cli.gap,
        seed: cli.seed,
        verbose: cli.verbose,
    };
    let oracle = GoodLpOracle::new();
    let outcome = method::run(&instance, &oracle, cli.method, &config)?;

    let (elapsed, lower, upper, gap) = outcome.totals();
    log::info!(
        "Method {}: vLB {lower:.6}, vUB {upper:.6}, gap {:.4}%, {elapsed:.2}s",
        cli.method.number(),
        100.0 * gap
    );

    let stem = report::output_stem(&cli.output, &instance, cli.method);
    for path in report::write_outputs(&stem, &instance, cli.method, &config, &outcome, cli.json)? {
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}
