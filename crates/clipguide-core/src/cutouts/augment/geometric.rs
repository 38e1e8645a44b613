//! Flip, rotation/translation and perspective warps.
//!
//! Warps use nearest-neighbour sampling and fill pixels that map outside the
//! source with zero.

use ndarray::{s, Array4};
use rand::{Rng, RngCore};

use super::Augmentation;

/// Mirror the width axis of every cutout with probability `p`.
#[derive(Debug, Clone, Copy)]
pub struct HorizontalFlip {
    pub p: f32,
}

impl HorizontalFlip {
    pub fn new(p: f32) -> Self {
        Self { p }
    }

    pub fn flip(batch: &mut Array4<f32>) {
        *batch = batch.slice(s![.., .., .., ..;-1]).to_owned();
    }
}

impl Augmentation for HorizontalFlip {
    fn apply(&self, batch: &mut Array4<f32>, rng: &mut dyn RngCore) {
        if rng.gen::<f32>() < self.p {
            Self::flip(batch);
        }
    }
}

/// Rotation by a uniform angle in `[-degrees, degrees]` about the image
/// center, plus a translation of up to `translate.0 * width` and
/// `translate.1 * height` pixels (rounded to whole pixels).
#[derive(Debug, Clone, Copy)]
pub struct RandomAffine {
    pub degrees: f32,
    pub translate: (f32, f32),
}

impl RandomAffine {
    pub fn new(degrees: f32, translate: (f32, f32)) -> Self {
        Self { degrees, translate }
    }

    /// Rotate by `angle` degrees (counter-clockwise on screen), then shift by
    /// `(tx, ty)` pixels.
    pub fn transform(batch: &mut Array4<f32>, angle: f64, tx: f64, ty: f64) {
        let (_, _, height, width) = batch.dim();
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        let (sin, cos) = angle.to_radians().sin_cos();

        warp_nearest(batch, |x, y| {
            // Output pixel center relative to the image center, minus the shift.
            let u = x + 0.5 - cx - tx;
            let v = y + 0.5 - cy - ty;
            let sx = u * cos - v * sin;
            let sy = u * sin + v * cos;
            (sx + cx - 0.5, sy + cy - 0.5)
        });
    }

    /// Draw `(angle, tx, ty)` for a `height x width` image.
    pub fn sample_params<R: Rng + ?Sized>(
        &self,
        height: usize,
        width: usize,
        rng: &mut R,
    ) -> (f64, f64, f64) {
        let degrees = f64::from(self.degrees.abs());
        let angle = rng.gen_range(-degrees..=degrees);

        let max_dx = f64::from(self.translate.0.abs()) * width as f64;
        let max_dy = f64::from(self.translate.1.abs()) * height as f64;
        let tx = rng.gen_range(-max_dx..=max_dx).round();
        let ty = rng.gen_range(-max_dy..=max_dy).round();
        (angle, tx, ty)
    }
}

impl Augmentation for RandomAffine {
    fn apply(&self, batch: &mut Array4<f32>, rng: &mut dyn RngCore) {
        let (_, _, height, width) = batch.dim();
        let (angle, tx, ty) = self.sample_params(height, width, rng);
        Self::transform(batch, angle, tx, ty);
    }
}

/// Corner-jitter perspective warp applied with probability `p`.
///
/// Each corner moves inward by up to `distortion_scale` of half the image
/// side; the output is the source warped so its corners land on the moved
/// points.
#[derive(Debug, Clone, Copy)]
pub struct RandomPerspective {
    pub distortion_scale: f32,
    pub p: f32,
}

/// Corner points in (x, y) order: top-left, top-right, bottom-right, bottom-left.
pub type Corners = [(f64, f64); 4];

impl RandomPerspective {
    pub fn new(distortion_scale: f32, p: f32) -> Self {
        Self { distortion_scale, p }
    }

    /// Draw moved corner positions for a `height x width` image.
    pub fn sample_corners<R: Rng + ?Sized>(
        &self,
        height: usize,
        width: usize,
        rng: &mut R,
    ) -> (Corners, Corners) {
        let d = f64::from(self.distortion_scale);
        let dx = (d * (width / 2) as f64) as usize;
        let dy = (d * (height / 2) as f64) as usize;

        let top_left = (near(rng, dx), near(rng, dy));
        let top_right = (far(rng, width, dx), near(rng, dy));
        let bottom_right = (far(rng, width, dx), far(rng, height, dy));
        let bottom_left = (near(rng, dx), far(rng, height, dy));

        let (w, h) = (width.saturating_sub(1) as f64, height.saturating_sub(1) as f64);
        let start = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        (start, [top_left, top_right, bottom_right, bottom_left])
    }

    /// Warp so that `start` corners of the source land on `end` in the
    /// output. Returns false (batch untouched) if the corners are degenerate.
    pub fn transform(batch: &mut Array4<f32>, start: &Corners, end: &Corners) -> bool {
        let Some(h) = homography(end, start) else {
            return false;
        };
        warp_nearest(batch, |x, y| {
            let denom = h[6] * x + h[7] * y + 1.0;
            (
                (h[0] * x + h[1] * y + h[2]) / denom,
                (h[3] * x + h[4] * y + h[5]) / denom,
            )
        });
        true
    }
}

impl Augmentation for RandomPerspective {
    fn apply(&self, batch: &mut Array4<f32>, rng: &mut dyn RngCore) {
        if rng.gen::<f32>() >= self.p {
            return;
        }
        let (_, _, height, width) = batch.dim();
        if height == 0 || width == 0 {
            return;
        }
        let (start, end) = self.sample_corners(height, width, rng);
        if !Self::transform(batch, &start, &end) {
            tracing::debug!(?end, "Skipping degenerate perspective warp");
        }
    }
}

/// Offset within `limit` pixels of the low edge.
fn near<R: Rng + ?Sized>(rng: &mut R, limit: usize) -> f64 {
    rng.gen_range(0..=limit) as f64
}

/// Offset within `limit` pixels of the high edge of a `side`-pixel axis.
fn far<R: Rng + ?Sized>(rng: &mut R, side: usize, limit: usize) -> f64 {
    rng.gen_range(side.saturating_sub(limit + 1)..side.max(1)) as f64
}

/// Rebuild every cutout by sampling the source at `source(x, y)` for each
/// output pixel. The mapping is shared across batch and channels.
fn warp_nearest(batch: &mut Array4<f32>, source: impl Fn(f64, f64) -> (f64, f64)) {
    let (n, channels, height, width) = batch.dim();

    let lookup: Vec<Option<(usize, usize)>> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let (sx, sy) = source(x as f64, y as f64);
            let (sx, sy) = (sx.round(), sy.round());
            let inside = sx >= 0.0 && sy >= 0.0 && sx < width as f64 && sy < height as f64;
            inside.then_some((sy as usize, sx as usize))
        })
        .collect();

    let mut out = Array4::<f32>::zeros((n, channels, height, width));
    for b in 0..n {
        for c in 0..channels {
            for (i, src) in lookup.iter().enumerate() {
                if let Some((sy, sx)) = *src {
                    out[[b, c, i / width, i % width]] = batch[[b, c, sy, sx]];
                }
            }
        }
    }
    *batch = out;
}

/// Coefficients `[a, b, c, d, e, f, g, h]` of the projective map taking each
/// `from` point to the matching `to` point:
/// `x' = (a x + b y + c) / (g x + h y + 1)`, `y' = (d x + e y + f) / (g x + h y + 1)`.
fn homography(from: &Corners, to: &Corners) -> Option<[f64; 8]> {
    let mut m = [[0.0f64; 9]; 8];
    for (i, (&(x, y), &(tx, ty))) in from.iter().zip(to.iter()).enumerate() {
        m[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -tx * x, -tx * y, tx];
        m[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -ty * x, -ty * y, ty];
    }
    solve8(m)
}

/// Gaussian elimination with partial pivoting on an augmented 8x9 system.
fn solve8(mut m: [[f64; 9]; 8]) -> Option<[f64; 8]> {
    const EPS: f64 = 1e-10;
    for col in 0..8 {
        let pivot = (col..8).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < EPS {
            return None;
        }
        m.swap(col, pivot);
        for row in 0..8 {
            if row != col {
                let factor = m[row][col] / m[col][col];
                if factor != 0.0 {
                    for k in col..9 {
                        m[row][k] -= factor * m[col][k];
                    }
                }
            }
        }
    }
    let mut out = [0.0; 8];
    for (i, value) in out.iter_mut().enumerate() {
        *value = m[i][8] / m[i][i];
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp(height: usize, width: usize) -> Array4<f32> {
        Array4::from_shape_fn((2, 3, height, width), |(n, c, y, x)| {
            (1 + n * 100 + c * 10 + y * width + x) as f32
        })
    }

    #[test]
    fn test_flip_mirrors_columns() {
        let mut b = ramp(3, 4);
        HorizontalFlip::flip(&mut b);
        let orig = ramp(3, 4);
        assert_eq!(b[[1, 2, 1, 0]], orig[[1, 2, 1, 3]]);
        assert_eq!(b[[0, 0, 2, 3]], orig[[0, 0, 2, 0]]);
    }

    #[test]
    fn test_flip_probability_extremes() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut b = ramp(3, 4);
        HorizontalFlip::new(0.0).apply(&mut b, &mut rng);
        assert_eq!(b, ramp(3, 4));
        HorizontalFlip::new(1.0).apply(&mut b, &mut rng);
        assert_ne!(b, ramp(3, 4));
    }

    #[test]
    fn test_affine_identity() {
        let mut b = ramp(5, 7);
        RandomAffine::transform(&mut b, 0.0, 0.0, 0.0);
        assert_eq!(b, ramp(5, 7));

        let mut rng = StdRng::seed_from_u64(1);
        let mut b = ramp(5, 7);
        RandomAffine::new(0.0, (0.0, 0.0)).apply(&mut b, &mut rng);
        assert_eq!(b, ramp(5, 7));
    }

    #[test]
    fn test_affine_translation_shifts_and_fills() {
        let mut b = ramp(4, 6);
        RandomAffine::transform(&mut b, 0.0, 2.0, 1.0);
        let orig = ramp(4, 6);
        assert_eq!(b[[0, 0, 1, 2]], orig[[0, 0, 0, 0]]);
        assert_eq!(b[[1, 2, 3, 5]], orig[[1, 2, 2, 3]]);
        assert_eq!(b[[0, 1, 0, 4]], 0.0);
        assert_eq!(b[[0, 1, 2, 1]], 0.0);
    }

    #[test]
    fn test_affine_half_turn_flips_both_axes() {
        let mut b = ramp(5, 5);
        RandomAffine::transform(&mut b, 180.0, 0.0, 0.0);
        let orig = ramp(5, 5);
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(b[[0, 1, y, x]], orig[[0, 1, 4 - y, 4 - x]]);
            }
        }
    }

    #[test]
    fn test_affine_shares_parameters_across_batch() {
        let mut b = Array4::<f32>::ones((3, 3, 16, 16));
        RandomAffine::new(15.0, (0.1, 0.1)).apply(&mut b, &mut StdRng::seed_from_u64(11));
        let first = b.index_axis(ndarray::Axis(0), 0).to_owned();
        for item in b.outer_iter() {
            assert_eq!(item, first);
        }
    }

    #[test]
    fn test_affine_params_stay_in_range() {
        let affine = RandomAffine::new(15.0, (0.1, 0.1));
        let mut rng = StdRng::seed_from_u64(21);
        let (mut min_angle, mut max_angle) = (0.0f64, 0.0f64);
        for _ in 0..500 {
            let (angle, tx, ty) = affine.sample_params(60, 200, &mut rng);
            assert!(angle.abs() <= 15.0);
            assert!(tx.abs() <= 20.0, "tx = {tx}");
            assert!(ty.abs() <= 6.0, "ty = {ty}");
            assert_eq!(tx, tx.round());
            assert_eq!(ty, ty.round());
            min_angle = min_angle.min(angle);
            max_angle = max_angle.max(angle);
        }
        assert!(min_angle < -10.0 && max_angle > 10.0);
    }

    #[test]
    fn test_homography_identity() {
        let corners = [(0.0, 0.0), (9.0, 0.0), (9.0, 9.0), (0.0, 9.0)];
        let h = homography(&corners, &corners).unwrap();
        let expected = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        for (a, b) in h.iter().zip(expected) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_perspective_with_shifted_corners_translates() {
        let start = [(0.0, 0.0), (5.0, 0.0), (5.0, 3.0), (0.0, 3.0)];
        let end = [(1.0, 0.0), (6.0, 0.0), (6.0, 3.0), (1.0, 3.0)];
        let mut b = ramp(4, 6);
        assert!(RandomPerspective::transform(&mut b, &start, &end));
        let orig = ramp(4, 6);
        assert_eq!(b[[0, 0, 2, 3]], orig[[0, 0, 2, 2]]);
        assert_eq!(b[[0, 0, 2, 0]], 0.0);
    }

    #[test]
    fn test_perspective_degenerate_corners_are_skipped() {
        let start = [(0.0, 0.0), (5.0, 0.0), (5.0, 3.0), (0.0, 3.0)];
        let end = [(2.0, 2.0); 4];
        let mut b = ramp(4, 6);
        assert!(!RandomPerspective::transform(&mut b, &start, &end));
        assert_eq!(b, ramp(4, 6));
    }

    #[test]
    fn test_perspective_corners_stay_near_edges() {
        let perspective = RandomPerspective::new(0.4, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let (start, end) = perspective.sample_corners(50, 80, &mut rng);
            assert_eq!(start[2], (79.0, 49.0));
            // 0.4 * 40 = 16 horizontally, 0.4 * 25 = 10 vertically.
            assert!(end[0].0 <= 16.0 && end[0].1 <= 10.0);
            assert!(end[2].0 >= 63.0 && end[2].0 <= 79.0);
            assert!(end[2].1 >= 39.0 && end[2].1 <= 49.0);
        }
    }

    #[test]
    fn test_perspective_zero_probability_is_noop() {
        let mut b = ramp(32, 32);
        let perspective = RandomPerspective::new(0.4, 0.0);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            perspective.apply(&mut b, &mut rng);
        }
        assert_eq!(b, ramp(32, 32));
    }

    #[test]
    fn test_perspective_applies_at_configured_rate() {
        let perspective = RandomPerspective::new(0.4, 0.7);
        let mut rng = StdRng::seed_from_u64(6);
        let orig = ramp(32, 32);
        let trials = 1000;
        let warped = (0..trials)
            .filter(|_| {
                let mut b = orig.clone();
                perspective.apply(&mut b, &mut rng);
                b != orig
            })
            .count();
        let rate = warped as f64 / trials as f64;
        assert!((0.62..=0.78).contains(&rate), "rate = {rate}");
    }

    #[test]
    fn test_perspective_handles_single_pixel() {
        let mut b = ramp(1, 1);
        RandomPerspective::new(0.4, 1.0).apply(&mut b, &mut StdRng::seed_from_u64(4));
        assert_eq!(b.dim(), (2, 3, 1, 1));
    }
}
