//! Shared math utilities.

use ndarray::{Array2, ArrayView1, Axis};

/// L2-normalize every row of a matrix in place. Zero rows are left untouched.
pub fn l2_normalize_rows(m: &mut Array2<f32>) {
    for mut row in m.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > f32::EPSILON {
            row.mapv_inplace(|x| x / norm);
        }
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&x| x / sum).collect()
}

/// Squared great-circle distance between two unit vectors, times two.
///
/// `2 * asin(|a - b| / 2)^2`. Zero for identical directions, `pi^2 / 2` for
/// opposite ones. Inputs must already be L2-normalized.
pub fn spherical_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    let chord = (&a - &b).mapv(|x| x * x).sum().sqrt();
    let half = (chord / 2.0).clamp(0.0, 1.0);
    2.0 * half.asin().powi(2)
}
