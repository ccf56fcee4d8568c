//! Big-M values for the indicator rows of the chance-constrained model.
//!
//! A big-M for row `i` of block `k` must bound `A_k[i] x - b_k[i]` over every
//! solution the model may return with `z_k = 0`. Three methods are provided:
//!
//! - **naive**: `sum_j A_k[i, j] - b_k[i]`, valid on the unit box;
//! - **belotti**: the largest violation among solutions whose objective does
//!   not exceed the current upper bound (a fractional knapsack for continuous
//!   variables, an oracle solve otherwise);
//! - **song**: for every pair of scenarios, the largest violation of a row of
//!   the first among solutions satisfying the second; the big-M is the
//!   quantile of those values that any feasible selection must respect.

use std::time::Instant;

use rayon::prelude::*;

use cclp_core::util::{argsort, max_excluded};
use cclp_core::{ChanceInstance, Oracle, PartitionedView, ScenarioSet, SolveParams, TimeBudget};

use crate::error::PartitionResult;
use crate::models::BigMKnapsackModel;
use crate::settings::BigMMethod;

/// Relative MIP gap of the integral big-M subproblems.
const KNAPSACK_GAP: f64 = 1e-8;

/// One big-M per (block, local row).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BigMTable {
    blocks: Vec<Vec<f64>>,
}

impl BigMTable {
    /// Wrap per-block values.
    pub fn from_blocks(blocks: Vec<Vec<f64>>) -> Self {
        Self { blocks }
    }

    /// Values of block `k`, one per local row.
    pub fn block(&self, k: usize) -> &[f64] {
        &self.blocks[k]
    }

    /// Number of blocks.
    pub fn nb_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Mean over all rows.
    pub fn average(&self) -> f64 {
        let (sum, count) = self
            .blocks
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, n), &m| (s + m, n + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// `max revenue x - constant  s.t.  weights x <= capacity, x in [0, 1]^n`.
///
/// Zero-weight items are taken whenever their revenue is positive; the rest
/// are filled greedily by decreasing revenue/weight ratio, the last one
/// fractionally. Items with non-positive revenue are never taken, and an
/// infinite capacity takes every positive item.
pub fn continuous_knapsack(revenue: &[f64], constant: f64, weights: &[f64], capacity: f64) -> f64 {
    let mut profit = -constant;
    let mut used = 0.0;
    let mut items = Vec::with_capacity(revenue.len());
    for (&r, &w) in revenue.iter().zip(weights) {
        if r <= 0.0 {
            continue;
        }
        if w <= 0.0 {
            profit += r;
            used += w;
        } else {
            items.push((r / w, r, w));
        }
    }
    items.sort_by(|a, b| b.0.total_cmp(&a.0));
    for (_, r, w) in items {
        let available = capacity - used;
        if available <= 0.0 {
            break;
        }
        let quantity = (available / w).min(1.0);
        profit += r * quantity;
        used += w * quantity;
    }
    profit
}

/// Pairwise scenario violations `v[s][s'][i]`: the largest violation of row
/// `i` of scenario `s` over the unit box points satisfying one row of `s'`
/// (minimized over that row).
#[derive(Debug, Clone)]
pub struct SongViolations {
    nb_scenarios: usize,
    nb_constraints: usize,
    values: Vec<f64>,
}

impl SongViolations {
    /// Compute the full table, in parallel over the first scenario.
    pub fn compute(instance: &ChanceInstance) -> Self {
        let nb_scenarios = instance.nb_scenarios();
        let m = instance.nb_constraints();
        let mut values = vec![f64::INFINITY; nb_scenarios * nb_scenarios * m];
        values
            .par_chunks_mut(nb_scenarios * m)
            .enumerate()
            .for_each(|(s, slab)| {
                for s_prime in 0..nb_scenarios {
                    for i in 0..m {
                        let row = instance.row(s, i);
                        let rhs = instance.rhs(s, i);
                        slab[s_prime * m + i] = (0..m)
                            .map(|i_prime| {
                                continuous_knapsack(
                                    row,
                                    rhs,
                                    instance.row(s_prime, i_prime),
                                    instance.rhs(s_prime, i_prime),
                                )
                            })
                            .fold(f64::INFINITY, f64::min);
                    }
                }
            });
        Self {
            nb_scenarios,
            nb_constraints: m,
            values,
        }
    }

    /// `v[s][s'][i]`.
    pub fn get(&self, s: usize, s_prime: usize, i: usize) -> f64 {
        self.values[(s * self.nb_scenarios + s_prime) * self.nb_constraints + i]
    }
}

fn naive_violation(instance: &ChanceInstance, s: usize, i: usize) -> f64 {
    instance.row(s, i).iter().sum::<f64>() - instance.rhs(s, i)
}

/// Blocks of scenarios the big-M values are computed for.
struct Blocks<'a> {
    instance: &'a ChanceInstance,
    members: Vec<Vec<usize>>,
    proba: &'a [f64],
    epsilon: f64,
}

impl Blocks<'_> {
    /// `(scenario, row)` of every local row of block `k`.
    fn rows(&self, k: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let m = self.instance.nb_constraints();
        self.members[k]
            .iter()
            .flat_map(move |&s| (0..m).map(move |i| (s, i)))
    }

    fn map_rows(&self, mut value: impl FnMut(usize, usize) -> f64) -> BigMTable {
        BigMTable::from_blocks(
            (0..self.members.len())
                .map(|k| self.rows(k).map(|(s, i)| value(s, i)).collect())
                .collect(),
        )
    }
}

/// Computes and holds the big-M table of the current blocks.
#[derive(Debug, Default)]
pub struct BigMFinder {
    table: BigMTable,
    song: Option<SongViolations>,
}

impl BigMFinder {
    /// Finder with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current table.
    pub fn table(&self) -> &BigMTable {
        &self.table
    }

    /// Recompute the table for the subsets of `view`.
    pub fn update_partition(
        &mut self,
        view: &PartitionedView<'_>,
        upper_bound: f64,
        method: BigMMethod,
        oracle: &dyn Oracle,
        budget: &TimeBudget,
    ) -> PartitionResult<()> {
        let blocks = Blocks {
            instance: view.instance(),
            members: (0..view.nb_blocks()).map(|c| view.members(c).to_vec()).collect(),
            proba: view.probabilities(),
            epsilon: view.epsilon(),
        };
        self.update(&blocks, upper_bound, method, oracle, budget)
    }

    /// Recompute the table with one block per scenario.
    pub fn update_scenarios(
        &mut self,
        instance: &ChanceInstance,
        upper_bound: f64,
        method: BigMMethod,
        oracle: &dyn Oracle,
        budget: &TimeBudget,
    ) -> PartitionResult<()> {
        let blocks = Blocks {
            instance,
            members: (0..instance.nb_scenarios()).map(|s| vec![s]).collect(),
            proba: instance.probabilities(),
            epsilon: instance.epsilon(),
        };
        self.update(&blocks, upper_bound, method, oracle, budget)
    }

    fn update(
        &mut self,
        blocks: &Blocks<'_>,
        upper_bound: f64,
        method: BigMMethod,
        oracle: &dyn Oracle,
        budget: &TimeBudget,
    ) -> PartitionResult<()> {
        let instance = blocks.instance;
        self.table = blocks.map_rows(|s, i| naive_violation(instance, s, i));
        log::info!("Average naive big-M is {:.4}", self.table.average());

        match method {
            BigMMethod::Naive => {
                log::warn!("Using naive big-M values");
                return Ok(());
            }
            BigMMethod::Belotti => self.belotti(blocks, upper_bound, oracle, budget)?,
            BigMMethod::Song => self.song(blocks),
        }
        log::info!("Average {method} big-M is {:.4}", self.table.average());
        Ok(())
    }

    fn belotti(
        &mut self,
        blocks: &Blocks<'_>,
        upper_bound: f64,
        oracle: &dyn Oracle,
        budget: &TimeBudget,
    ) -> PartitionResult<()> {
        let instance = blocks.instance;
        let m = instance.nb_constraints();
        let start = Instant::now();
        let per_row: Vec<Option<f64>> = if instance.is_continuous() {
            (0..instance.nb_scenarios() * m)
                .map(|r| {
                    let (s, i) = (r / m, r % m);
                    Some(continuous_knapsack(
                        instance.row(s, i),
                        instance.rhs(s, i),
                        instance.cost(),
                        upper_bound,
                    ))
                })
                .collect()
        } else {
            let mut model = BigMKnapsackModel::new(instance, upper_bound);
            let mut values = Vec::with_capacity(instance.nb_scenarios() * m);
            for s in 0..instance.nb_scenarios() {
                for i in 0..m {
                    if budget.is_exhausted() {
                        values.push(None);
                        continue;
                    }
                    let params = SolveParams::default()
                        .with_mip_gap(KNAPSACK_GAP)
                        .with_time_limit(budget.remaining());
                    values.push(model.max_violation(
                        instance.row(s, i),
                        instance.rhs(s, i),
                        oracle,
                        &params,
                    )?);
                }
            }
            values
        };
        let missing = per_row.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            log::warn!("Kept the naive big-M for {missing} rows without a knapsack bound");
        }
        self.table = blocks.map_rows(|s, i| {
            per_row[s * m + i].unwrap_or_else(|| naive_violation(instance, s, i))
        });
        log::debug!(
            "Belotti big-M over {} rows in {:.3}s",
            per_row.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn song(&mut self, blocks: &Blocks<'_>) {
        let instance = blocks.instance;
        let violations = self.song.get_or_insert_with(|| {
            log::info!("Computing all pairwise scenario violations");
            SongViolations::compute(instance)
        });
        let excluded = max_excluded(blocks.proba, blocks.epsilon);
        let table = blocks.map_rows(|s, i| {
            let per_block: Vec<f64> = blocks
                .members
                .iter()
                .map(|members| {
                    members
                        .iter()
                        .map(|&s_prime| violations.get(s, s_prime, i))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let order = argsort(&per_block);
            let pick = order[excluded.min(order.len() - 1)];
            per_block[pick]
        });
        self.table = table;
    }
}
