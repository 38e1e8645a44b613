//! Adaptive average pooling for resizing crops to a fixed resolution.
//!
//! Output cell `i` averages input rows `floor(i * in / out) .. ceil((i + 1) * in / out)`,
//! matching `adaptive_avg_pool2d`. When the crop is smaller than the target the
//! bins overlap and the result is a nearest-style upsample.

use ndarray::{s, Array3, ArrayView3, ArrayViewMut3};

/// Half-open input range covered by output cell `i`.
fn bin(i: usize, input: usize, output: usize) -> (usize, usize) {
    let start = i * input / output;
    let end = ((i + 1) * input).div_ceil(output);
    (start, end)
}

/// Pool a (C, H, W) view into a new (C, out_h, out_w) array.
pub fn adaptive_avg_pool2d(input: &ArrayView3<f32>, out_h: usize, out_w: usize) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros((input.dim().0, out_h, out_w));
    adaptive_avg_pool2d_into(input, &mut out.view_mut());
    out
}

/// Pool a (C, H, W) view into a preallocated (C, out_h, out_w) slot.
pub fn adaptive_avg_pool2d_into(input: &ArrayView3<f32>, out: &mut ArrayViewMut3<f32>) {
    let (channels, in_h, in_w) = input.dim();
    let (_, out_h, out_w) = out.dim();
    if in_h == 0 || in_w == 0 {
        return;
    }

    let rows: Vec<(usize, usize)> = (0..out_h).map(|i| bin(i, in_h, out_h)).collect();
    let cols: Vec<(usize, usize)> = (0..out_w).map(|j| bin(j, in_w, out_w)).collect();

    for c in 0..channels {
        for (i, &(r0, r1)) in rows.iter().enumerate() {
            for (j, &(c0, c1)) in cols.iter().enumerate() {
                let window = input.slice(s![c, r0..r1, c0..c1]);
                let count = ((r1 - r0) * (c1 - c0)) as f32;
                out[[c, i, j]] = window.sum() / count;
            }
        }
    }
}
