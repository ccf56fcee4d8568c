//! Bound bookkeeping shared by the solvers.

use serde::Serialize;

use cclp_core::util::relative_gap;

/// Slack on bound comparisons.
pub const BOUND_TOL: f64 = 1e-8;

/// Best known bounds and the points attaining them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundState {
    /// Best feasible objective.
    pub lower: f64,
    /// Best proven bound.
    pub upper: f64,
    /// Point attaining `lower` (empty until one is found).
    pub x_lower: Vec<f64>,
    /// Last accepted upper-bound point (empty until one is found).
    pub x_upper: Vec<f64>,
}

impl Default for BoundState {
    fn default() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            x_lower: Vec::new(),
            x_upper: Vec::new(),
        }
    }
}

impl BoundState {
    /// `(upper - lower) / lower`, infinite while either bound is.
    pub fn gap(&self) -> f64 {
        relative_gap(self.lower, self.upper)
    }

    /// Replace the lower bound when `value` improves it.
    pub fn offer_lower(&mut self, x: &[f64], value: f64) -> bool {
        if value > self.lower {
            self.lower = value;
            self.x_lower = x.to_vec();
            true
        } else {
            false
        }
    }

    /// Accept an upper bound `bound` and, when its objective `obj` does not
    /// exceed the current bound, the point `x`.
    pub fn offer_upper(&mut self, x: &[f64], obj: f64, bound: f64) -> bool {
        if bound > self.upper + BOUND_TOL {
            return false;
        }
        if obj <= self.upper + BOUND_TOL {
            self.x_upper = x.to_vec();
        }
        self.upper = bound;
        true
    }

    /// Record an upper-bound point that is feasible for the whole instance,
    /// whatever its objective.
    pub fn accept_feasible_upper(&mut self, x: &[f64]) {
        self.x_upper = x.to_vec();
    }

    /// Close the gap on a point feasible for the whole instance.
    pub fn close(&mut self) {
        self.lower = self.upper;
        self.x_lower = self.x_upper.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_only_tighten() {
        let mut bounds = BoundState::default();
        assert!(bounds.gap().is_infinite());
        assert!(bounds.offer_upper(&[1.0], 2.0, 2.0));
        assert!(!bounds.offer_upper(&[0.0], 3.0, 3.0));
        assert_eq!(bounds.upper, 2.0);
        assert!(bounds.offer_lower(&[0.5], 1.0));
        assert!(!bounds.offer_lower(&[0.1], 0.5));
        assert!((bounds.gap() - 1.0).abs() < 1e-12);
        bounds.close();
        assert_eq!(bounds.lower, 2.0);
        assert_eq!(bounds.x_lower, vec![1.0]);
    }

    #[test]
    fn test_feasible_point_replaces_rejected_one() {
        let mut bounds = BoundState::default();
        assert!(bounds.offer_upper(&[1.0], 2.0, 2.0));
        // Objective above vUB: the point is not kept by the offer.
        assert!(bounds.offer_upper(&[0.9], 2.5, 2.0));
        assert_eq!(bounds.x_upper, vec![1.0]);
        bounds.accept_feasible_upper(&[0.9]);
        bounds.close();
        assert_eq!(bounds.x_lower, vec![0.9]);
        assert_eq!(bounds.lower, 2.0);
    }
}
