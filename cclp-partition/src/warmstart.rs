//! Warm start of the partitioned model from the previous indicator values.

use cclp_core::IndexRemap;

use crate::models::CclpModel;

/// Carries the last `z` across refinement and merging.
///
/// Refinement only appends subsets, so old indices stay valid; merging
/// compacts the arena and the recorded [`IndexRemap`] translates them.
#[derive(Debug, Clone, Default)]
pub struct WarmStarter {
    previous_z: Vec<f64>,
    remap: Option<IndexRemap>,
}

impl WarmStarter {
    /// Empty warm starter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the indicators of the last partitioned solution.
    pub fn record_solution(&mut self, z: &[f64]) {
        self.previous_z = z.to_vec();
        self.remap = None;
    }

    /// Remember the reindexing of the last merge.
    pub fn record_merge(&mut self, remap: IndexRemap) {
        self.remap = Some(remap);
    }

    /// New indices of the subsets selected by the previous solution.
    pub fn hints(&self) -> Vec<usize> {
        self.previous_z
            .iter()
            .enumerate()
            .filter(|(_, &z)| z > 0.5)
            .filter_map(|(c, _)| match &self.remap {
                Some(remap) => remap.get(c),
                None => Some(c),
            })
            .collect()
    }

    /// Hint the selected subsets on `model`.
    pub fn apply(&self, model: &mut CclpModel) {
        let hints = self.hints();
        if !hints.is_empty() {
            log::debug!("Warm start with {} selected subsets", hints.len());
            model.warm_start(&hints);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cclp_core::Partition;

    #[test]
    fn test_hints_follow_merge() {
        let mut warm = WarmStarter::new();
        assert!(warm.hints().is_empty());
        warm.record_solution(&[1.0, 0.0, 1.0, 1.0]);
        assert_eq!(warm.hints(), vec![0, 2, 3]);

        let mut partition = Partition::from_subsets(vec![vec![0], vec![1], vec![2], vec![3]]);
        partition.merge_into(1, 2);
        warm.record_merge(partition.compact(&[2]));
        assert_eq!(warm.hints(), vec![0, 2]);
    }
}
