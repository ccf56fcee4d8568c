//! End-to-end tests for the core data model.
//!
//! These tests load a generated instance from disk, push it through
//! partitions and views, and solve models built over it with the bundled
//! oracle.

use std::io::Write;

use cclp_core::{
    read_instance, ChanceInstance, Cmp, GoodLpOracle, InstanceData, LinearModel, Oracle,
    OracleStatus, Partition, PartitionedView, ScenarioSet, Sense, SolveParams, VarSpec,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn write_instance(n: usize, m: usize, nb_scenarios: usize, seed: u64) -> std::path::PathBuf {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut text = format!("{n},{m},{nb_scenarios}\n");
    let row = |rng: &mut ChaCha8Rng, len: usize| {
        (0..len)
            .map(|_| format!("{:.3}", rng.gen_range(1.0..10.0)))
            .collect::<Vec<_>>()
            .join(",")
    };
    text.push_str(&row(&mut rng, n));
    text.push('\n');
    for _ in 0..nb_scenarios * m {
        text.push_str(&row(&mut rng, n));
        text.push('\n');
    }
    text.push_str(&vec!["15"; m].join(","));
    text.push('\n');

    let path = std::env::temp_dir().join(format!("cclp-core-it-{seed}-{n}-{m}-{nb_scenarios}.csv"));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
    path
}

/// Deterministic model: maximize c x subject to the rows of every block.
fn deterministic<S: ScenarioSet>(set: &S, blocks: &[usize]) -> LinearModel {
    let mut model = LinearModel::new("deter", Sense::Maximize);
    let x: Vec<_> = (0..set.nb_vars())
        .map(|j| {
            model.add_var(VarSpec::typed(
                format!("x[{j}]"),
                set.var_types()[j],
                set.var_lb()[j],
                set.var_ub()[j],
            ))
        })
        .collect();
    let objective = x.iter().zip(set.cost()).map(|(&v, &c)| (v, c)).collect();
    model.set_objective(Sense::Maximize, objective, 0.0);
    for &k in blocks {
        for i in 0..set.nb_rows(k) {
            let terms = x.iter().zip(set.row(k, i)).map(|(&v, &a)| (v, a)).collect();
            model.add_row(terms, Cmp::Le, set.rhs(k, i));
        }
    }
    model
}

#[test]
fn test_loaded_instance_shapes() {
    let path = write_instance(6, 10, 10, 421);
    let inst = read_instance(&path, true, 0.2).unwrap();
    assert_eq!(inst.nb_vars(), 6);
    assert_eq!(inst.nb_constraints(), 10);
    assert_eq!(inst.nb_scenarios(), 10);
    assert_eq!(inst.minimum_partition_size(), 3);
    assert!(inst
        .cost()
        .iter()
        .all(|&c| ((c * 10.0).round() - c * 10.0).abs() < 1e-9));
    let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
    assert_eq!(inst.name(), stem);
}

#[test]
fn test_subset_models_agree_with_scenario_models() {
    let path = write_instance(4, 3, 6, 7);
    let inst = read_instance(&path, true, 0.2).unwrap();
    let part = Partition::from_subsets(vec![vec![0, 3], vec![1, 2, 5], vec![4]]);
    part.check(inst.nb_scenarios(), Some(3)).unwrap();
    let view = PartitionedView::new(&inst, &part);

    let oracle = GoodLpOracle::new();
    let params = SolveParams::default();
    let by_view = oracle.solve(&deterministic(&view, &[1]), &params).unwrap();
    let by_scenarios = oracle
        .solve(&deterministic(&inst, &[1, 2, 5]), &params)
        .unwrap();
    assert!(by_view.is_optimal());
    assert!((by_view.obj_val - by_scenarios.obj_val).abs() < 1e-6);
}

#[test]
fn test_cost_of_growing_subsets_is_non_increasing() {
    let path = write_instance(5, 2, 8, 11);
    let inst = read_instance(&path, false, 0.25).unwrap();
    let oracle = GoodLpOracle::new();
    let mut previous = f64::INFINITY;
    for last in 0..inst.nb_scenarios() {
        let blocks: Vec<usize> = (0..=last).collect();
        let sol = oracle
            .solve(&deterministic(&inst, &blocks), &SolveParams::default())
            .unwrap();
        assert_eq!(sol.status, OracleStatus::Optimal);
        assert!(sol.obj_val <= previous + 1e-9);
        assert!(inst.evaluate(&sol.x).infeasible.iter().all(|&s| s > last));
        previous = sol.obj_val;
    }
}

#[test]
fn test_infeasible_block_is_reported() {
    let data = InstanceData::unit_box(
        "neg",
        vec![1.0],
        vec![vec![vec![1.0]], vec![vec![1.0]]],
        vec![vec![1.0], vec![-1.0]],
        true,
        0.5,
    );
    let inst = ChanceInstance::new(data).unwrap();
    let sol = GoodLpOracle::new()
        .solve(&deterministic(&inst, &[0, 1]), &SolveParams::default())
        .unwrap();
    assert_eq!(sol.status, OracleStatus::Infeasible);
    assert!(!sol.has_solution());
}
