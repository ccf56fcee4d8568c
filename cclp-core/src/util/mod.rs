//! Small numerical helpers shared by the data model and the algorithm.

/// Guard added before flooring `epsilon * n` so that products such as
/// `0.2 * 10.0` never round down to the wrong integer.
pub const FLOOR_GUARD: f64 = 1e-9;

/// Dense dot product.
#[inline]
pub fn dot(a: &[f64], x: &[f64]) -> f64 {
    a.iter().zip(x).map(|(ai, xi)| ai * xi).sum()
}

/// Euclidean norm.
#[inline]
pub fn norm2(a: &[f64]) -> f64 {
    a.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// `floor(epsilon * n)` with a guard against floating-point round-down.
pub fn tolerance_count(epsilon: f64, n: usize) -> usize {
    let raw = epsilon * n as f64 + FLOOR_GUARD;
    if raw <= 0.0 {
        0
    } else {
        raw.floor() as usize
    }
}

/// Largest number of blocks whose probabilities may be dropped together while
/// keeping the retained mass at least `1 - epsilon`.
///
/// For uniform probabilities this equals [`tolerance_count`].
pub fn max_excluded(proba: &[f64], epsilon: f64) -> usize {
    let mut sorted = proba.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut mass = 0.0;
    let mut count = 0;
    for p in sorted {
        mass += p;
        if mass > epsilon + FLOOR_GUARD {
            break;
        }
        count += 1;
    }
    count
}

/// Indices of `values` sorted ascending; ties keep index order.
pub fn argsort(values: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    idx
}

/// Relative gap `(ub - lb) / lb`, infinite when either bound is.
pub fn relative_gap(lb: f64, ub: f64) -> f64 {
    if !lb.is_finite() || !ub.is_finite() {
        f64::INFINITY
    } else {
        (ub - lb) / lb
    }
}
