//! CSV instance reader for stochastic multi-dimensional knapsack problems.
//!
//! Layout, one comma-separated row per line:
//!
//! ```text
//! n, m, N                 header: variables, constraints per scenario, scenarios
//! c_1, ..., c_n           objective
//! A_1[1,:] ... A_N[m,:]   N * m constraint rows, scenario-major
//! b_1, ..., b_m           right-hand side shared by every scenario
//! ```
//!
//! Coefficients are rounded to one decimal, scenarios are equiprobable and
//! variables live on the unit box.

use std::fs;
use std::path::Path;

use crate::error::{CoreError, CoreResult};
use crate::instance::{ChanceInstance, InstanceData};

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn parse_row(line: &str, lineno: usize) -> CoreResult<Vec<f64>> {
    line.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| {
            field.parse::<f64>().map_err(|e| CoreError::Parse {
                line: lineno,
                msg: format!("'{field}': {e}"),
            })
        })
        .collect()
}

fn expect_len(row: &[f64], len: usize, lineno: usize, what: &str) -> CoreResult<()> {
    if row.len() != len {
        return Err(CoreError::Parse {
            line: lineno,
            msg: format!("{what} has {} entries, expected {len}", row.len()),
        });
    }
    Ok(())
}

fn header_count(value: f64, lineno: usize) -> CoreResult<usize> {
    if value < 1.0 || value.fract() != 0.0 {
        return Err(CoreError::Parse {
            line: lineno,
            msg: format!("header entry {value} is not a positive integer"),
        });
    }
    Ok(value as usize)
}

/// Parse instance text. `name` becomes the instance name.
pub fn parse_instance(
    text: &str,
    name: &str,
    continuous: bool,
    epsilon: f64,
) -> CoreResult<ChanceInstance> {
    let rows: Vec<(usize, Vec<f64>)> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(k, line)| parse_row(line, k + 1).map(|row| (k + 1, row)))
        .collect::<CoreResult<_>>()?;

    let Some((header_line, header)) = rows.first() else {
        return Err(CoreError::Parse {
            line: 1,
            msg: "empty instance file".into(),
        });
    };
    expect_len(header, 3, *header_line, "header")?;
    let n = header_count(header[0], *header_line)?;
    let m = header_count(header[1], *header_line)?;
    let nb_scenarios = header_count(header[2], *header_line)?;

    let expected = 3 + nb_scenarios * m;
    if rows.len() != expected {
        let line = rows.last().map_or(1, |(l, _)| *l);
        return Err(CoreError::Parse {
            line,
            msg: format!(
                "found {} data rows, expected {expected} for {nb_scenarios} scenarios of {m} rows",
                rows.len()
            ),
        });
    }

    let (c_line, c) = &rows[1];
    expect_len(c, n, *c_line, "objective")?;
    let c: Vec<f64> = c.iter().copied().map(round1).collect();

    let mut a = Vec::with_capacity(nb_scenarios);
    for s in 0..nb_scenarios {
        let mut block = Vec::with_capacity(m);
        for i in 0..m {
            let (line, row) = &rows[2 + s * m + i];
            expect_len(row, n, *line, "constraint row")?;
            block.push(row.iter().copied().map(round1).collect());
        }
        a.push(block);
    }

    let (b_line, b) = &rows[expected - 1];
    expect_len(b, m, *b_line, "right-hand side")?;
    let b: Vec<f64> = b.iter().copied().map(round1).collect();

    log::debug!("parsed instance {name}: n = {n}, m = {m}, N = {nb_scenarios}");
    ChanceInstance::new(InstanceData::unit_box(
        name,
        c,
        a,
        vec![b; nb_scenarios],
        continuous,
        epsilon,
    ))
}

/// Read an instance file; the instance is named after the file stem.
pub fn read_instance(
    path: impl AsRef<Path>,
    continuous: bool,
    epsilon: f64,
) -> CoreResult<ChanceInstance> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "instance".to_string());
    parse_instance(&text, &name, continuous, epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{ScenarioSet, VarType};

    const TEXT: &str = "2,1,3\n\
                        1.04,2.0\n\
                        0.96,1.0\n\
                        2.0,0.5\n\
                        1.0,1.0\n\
                        1.52\n";

    #[test]
    fn test_parse_rounds_and_broadcasts_rhs() {
        let inst = parse_instance(TEXT, "knap", true, 0.34).unwrap();
        assert_eq!(inst.name(), "knap");
        assert_eq!(inst.nb_vars(), 2);
        assert_eq!(inst.nb_scenarios(), 3);
        assert_eq!(inst.cost(), &[1.0, 2.0]);
        assert_eq!(inst.row(0, 0), &[1.0, 1.0]);
        for s in 0..3 {
            assert_eq!(inst.rhs(s, 0), 1.5);
        }
        assert_eq!(inst.var_types(), &[VarType::Continuous; 2]);
        assert_eq!(inst.tolerance_count(), 1);
    }

    #[test]
    fn test_binary_flag() {
        let inst = parse_instance(TEXT, "knap", false, 0.34).unwrap();
        assert!(!inst.is_continuous());
        assert_eq!(inst.var_ub(), &[1.0, 1.0]);
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        let bad = TEXT.replace("2.0,0.5", "2.0,x");
        match parse_instance(&bad, "bad", true, 0.2) {
            Err(CoreError::Parse { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected {other:?}"),
        }
        let short = "2,1,3\n1,2\n1,1\n";
        assert!(matches!(
            parse_instance(short, "short", true, 0.2),
            Err(CoreError::Parse { .. })
        ));
        assert!(parse_instance("", "empty", true, 0.2).is_err());
    }
}
