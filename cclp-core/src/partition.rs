//! Scenario partitions.
//!
//! A partition is an arena of subsets addressed by index. Subsets are only
//! appended (refinement) or unioned and then compacted (merging); compaction
//! returns an [`IndexRemap`] so that callers holding per-subset caches can
//! follow the reindexing.

use crate::error::{CoreError, CoreResult};

/// Ordered collection of disjoint scenario subsets covering `0..N`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    subsets: Vec<Vec<usize>>,
}

impl Partition {
    /// Wrap existing subsets without checking them.
    pub fn from_subsets(subsets: Vec<Vec<usize>>) -> Self {
        Self { subsets }
    }

    /// Number of subsets.
    pub fn len(&self) -> usize {
        self.subsets.len()
    }

    /// True when the partition holds no subset.
    pub fn is_empty(&self) -> bool {
        self.subsets.is_empty()
    }

    /// Scenarios of subset `c`.
    pub fn subset(&self, c: usize) -> &[usize] {
        &self.subsets[c]
    }

    /// All subsets in index order.
    pub fn subsets(&self) -> &[Vec<usize>] {
        &self.subsets
    }

    /// Iterate over the subsets.
    pub fn iter(&self) -> impl Iterator<Item = &Vec<usize>> {
        self.subsets.iter()
    }

    /// Replace subset `c` by `keep` and append `moved` as a new subset.
    ///
    /// Returns the index of the appended subset.
    pub fn split_off(&mut self, c: usize, keep: Vec<usize>, moved: Vec<usize>) -> usize {
        self.subsets[c] = keep;
        self.subsets.push(moved);
        self.subsets.len() - 1
    }

    /// Append the scenarios of `source` to `target`, leaving `source` empty.
    ///
    /// The emptied subset must be removed with [`Partition::compact`].
    pub fn merge_into(&mut self, target: usize, source: usize) {
        let moved = std::mem::take(&mut self.subsets[source]);
        self.subsets[target].extend(moved);
    }

    /// Delete the given subsets, processing indices in descending order, and
    /// return the old-to-new index map.
    pub fn compact(&mut self, deleted: &[usize]) -> IndexRemap {
        let old_len = self.subsets.len();
        let mut order = deleted.to_vec();
        order.sort_unstable_by(|a, b| b.cmp(a));
        order.dedup();
        for &c in &order {
            self.subsets.remove(c);
        }
        IndexRemap::after_deletion(old_len, &order)
    }

    /// Count, per subset, how many members satisfy `pred`.
    pub fn count_members(&self, pred: impl Fn(usize) -> bool) -> Vec<usize> {
        self.subsets
            .iter()
            .map(|members| members.iter().filter(|&&s| pred(s)).count())
            .collect()
    }

    /// Verify the cover and disjointness invariants and, optionally, the size.
    pub fn check(&self, nb_scenarios: usize, expected_len: Option<usize>) -> CoreResult<()> {
        if let Some(len) = expected_len {
            if self.subsets.len() != len {
                return Err(CoreError::InvalidPartition(format!(
                    "expected {len} subsets, found {}",
                    self.subsets.len()
                )));
            }
        }
        if let Some(c) = self.subsets.iter().position(|members| members.is_empty()) {
            return Err(CoreError::InvalidPartition(format!("subset {c} is empty")));
        }
        let mut seen = vec![false; nb_scenarios];
        for members in &self.subsets {
            for &s in members {
                if s >= nb_scenarios {
                    return Err(CoreError::InvalidPartition(format!(
                        "scenario {s} out of range 0..{nb_scenarios}"
                    )));
                }
                if seen[s] {
                    return Err(CoreError::InvalidPartition(format!(
                        "scenario {s} appears twice"
                    )));
                }
                seen[s] = true;
            }
        }
        if let Some(s) = seen.iter().position(|&v| !v) {
            return Err(CoreError::InvalidPartition(format!("scenario {s} is missing")));
        }
        Ok(())
    }
}

/// Old-to-new subset index map produced by [`Partition::compact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRemap {
    map: Vec<Option<usize>>,
}

impl IndexRemap {
    /// Identity map over `len` subsets.
    pub fn identity(len: usize) -> Self {
        Self {
            map: (0..len).map(Some).collect(),
        }
    }

    fn after_deletion(old_len: usize, deleted: &[usize]) -> Self {
        let mut map = Vec::with_capacity(old_len);
        let mut next = 0;
        for c in 0..old_len {
            if deleted.contains(&c) {
                map.push(None);
            } else {
                map.push(Some(next));
                next += 1;
            }
        }
        Self { map }
    }

    /// New index of old subset `c`, `None` if it was deleted or is unknown.
    pub fn get(&self, c: usize) -> Option<usize> {
        self.map.get(c).copied().flatten()
    }

    /// Number of indices before compaction.
    pub fn old_len(&self) -> usize {
        self.map.len()
    }

    /// Number of surviving subsets.
    pub fn new_len(&self) -> usize {
        self.map.iter().flatten().count()
    }

    /// Old indices that were deleted.
    pub fn deleted(&self) -> Vec<usize> {
        self.map
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_none())
            .map(|(c, _)| c)
            .collect()
    }

    /// Carry a per-subset cache across the compaction.
    pub fn apply<T>(&self, values: Vec<T>) -> Vec<T> {
        values
            .into_iter()
            .enumerate()
            .filter(|(c, _)| self.get(*c).is_some())
            .map(|(_, v)| v)
            .collect()
    }
}
