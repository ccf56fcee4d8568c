use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use cclp_core::{ChanceInstance, ScenarioSet};
use cclp_partition::method_codes;

use crate::method::{Method, RunConfig, RunOutcome};

/// Output path without extension: `<out><name>-<eps%>-<1|0>-<method>`.
pub fn output_stem(out: &str, instance: &ChanceInstance, method: Method) -> PathBuf {
    PathBuf::from(format!(
        "{out}{}-{:.0}-{}-{}",
        instance.name(),
        instance.epsilon() * 100.0,
        u8::from(instance.is_continuous()),
        method.number()
    ))
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// One CSV row describing the run.
pub fn run_row(instance: &ChanceInstance, config: &RunConfig, outcome: &RunOutcome) -> String {
    let mut fields = vec![
        instance.name().to_string(),
        instance.nb_vars().to_string(),
        instance.nb_constraints().to_string(),
        instance.nb_scenarios().to_string(),
        u8::from(instance.is_continuous()).to_string(),
        format!("{:.3}", instance.epsilon()),
        format!("{:.3}", config.time_limit),
        format!("{:.3}", 100.0 * config.gap),
        u8::from(outcome.uses_big_m()).to_string(),
    ];
    match outcome {
        RunOutcome::Adaptive { settings, summary } => {
            let (split, init, projection) = method_codes(
                settings.split_method,
                settings.initial_partition,
                settings.projection_method,
            );
            fields.extend([
                split.to_string(),
                init.to_string(),
                projection.to_string(),
                summary.iterations.to_string(),
                summary.nb_subsets.to_string(),
            ]);
        }
        RunOutcome::Exact { settings, summary } => {
            fields.push(
                settings
                    .big_m_method
                    .map_or_else(|| "indicator".to_string(), |m| m.to_string()),
            );
            fields.push(format!("{:.3}", summary.big_m_time));
        }
    }
    let (elapsed, lower, upper, gap) = outcome.totals();
    fields.extend([
        format!("{elapsed:.3}"),
        format!("{lower:.3}"),
        format!("{upper:.3}"),
        format!("{:.3}", 100.0 * gap),
    ]);
    fields.join(",")
}

/// Iteration records of an adaptive run, or the bound trace of an exact run.
pub fn iteration_rows(outcome: &RunOutcome) -> Vec<String> {
    match outcome {
        RunOutcome::Adaptive { summary, .. } => summary
            .records
            .iter()
            .map(|r| {
                format!(
                    "{},{:.3},{:.3},{:.3},{:.3},{}",
                    r.iteration, r.elapsed, r.neg_lower, r.neg_upper, r.gap_percent, r.nb_subsets
                )
            })
            .collect(),
        RunOutcome::Exact { summary, .. } => summary
            .trace
            .iter()
            .map(|s| format!("{:.3},{:.3},{:.3}", s.elapsed, s.incumbent, s.bound))
            .collect(),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    instance: &'a str,
    method: u8,
    epsilon: f64,
    continuous: bool,
    outcome: &'a RunOutcome,
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{line}").with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Write `<stem>.csv`, `<stem>-iter.csv` and optionally `<stem>.json`.
pub fn write_outputs(
    stem: &Path,
    instance: &ChanceInstance,
    method: Method,
    config: &RunConfig,
    outcome: &RunOutcome,
    json: bool,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(3);

    let run = with_suffix(stem, ".csv");
    write_lines(&run, &[run_row(instance, config, outcome)])?;
    written.push(run);

    let iter = with_suffix(stem, "-iter.csv");
    write_lines(&iter, &iteration_rows(outcome))?;
    written.push(iter);

    if json {
        let path = with_suffix(stem, ".json");
        let file = File::create(&path).with_context(|| format!("Failed to create file {}", path.display()))?;
        let report = JsonReport {
            instance: instance.name(),
            method: method.number(),
            epsilon: instance.epsilon(),
            continuous: instance.is_continuous(),
            outcome,
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::{GoodLpOracle, InstanceData};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn instance(seed: u64) -> ChanceInstance {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = 3;
        let c = (0..n).map(|_| rng.gen_range(1..10) as f64).collect();
        let a: Vec<Vec<Vec<f64>>> = (0..6)
            .map(|_| vec![(0..n).map(|_| rng.gen_range(1..10) as f64).collect()])
            .collect();
        let b = a
            .iter()
            .map(|rows| vec![(rows[0].iter().sum::<f64>() / 2.0).round()])
            .collect();
        ChanceInstance::new(InstanceData::unit_box("knap-3-1-6", c, a, b, true, 0.2)).unwrap()
    }

    fn config() -> RunConfig {
        RunConfig {
            time_limit: 30.0,
            gap: 1e-4,
            seed: 421,
            verbose: false,
        }
    }

    #[test]
    fn test_output_stem() {
        let stem = output_stem("out/", &instance(0), Method::AdaptiveCost);
        assert_eq!(stem, PathBuf::from("out/knap-3-1-6-20-1-4"));
        assert_eq!(with_suffix(&stem, "-iter.csv"), PathBuf::from("out/knap-3-1-6-20-1-4-iter.csv"));
    }

    #[test]
    fn test_rows_and_files() {
        let inst = instance(4);
        let oracle = GoodLpOracle::new();
        let dir = std::env::temp_dir().join("cclp-bench-report");
        std::fs::create_dir_all(&dir).unwrap();
        let out = format!("{}/", dir.display());

        for method in [Method::ExactBelotti, Method::AdaptiveRandom] {
            let outcome = crate::method::run(&inst, &oracle, method, &config()).unwrap();
            let row = run_row(&inst, &config(), &outcome);
            let fields: Vec<&str> = row.split(',').collect();
            assert_eq!(fields[0], "knap-3-1-6");
            assert_eq!(fields[3], "6");
            let expected = match method {
                Method::ExactBelotti => 9 + 2 + 4,
                _ => 9 + 5 + 4,
            };
            assert_eq!(fields.len(), expected);

            let stem = output_stem(&out, &inst, method);
            let written = write_outputs(&stem, &inst, method, &config(), &outcome, true).unwrap();
            assert_eq!(written.len(), 3);
            let json: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&written[2]).unwrap()).unwrap();
            assert_eq!(json["method"], method.number());
        }
    }
}
