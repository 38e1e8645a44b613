//! Noise, grayscale and color jitter.

use ndarray::{s, Array4, Axis, Zip};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};

use super::Augmentation;

/// ITU-R 601-2 luma weights.
const LUMA: [f32; 3] = [0.2989, 0.587, 0.114];

fn luma(r: f32, g: f32, b: f32) -> f32 {
    LUMA[0] * r + LUMA[1] * g + LUMA[2] * b
}

/// Run `f` on every (r, g, b) pixel of every cutout.
fn for_each_pixel(batch: &mut Array4<f32>, mut f: impl FnMut(&mut f32, &mut f32, &mut f32)) {
    for mut image in batch.axis_iter_mut(Axis(0)) {
        let (mut r, mut g, mut b) =
            image.multi_slice_mut((s![0, .., ..], s![1, .., ..], s![2, .., ..]));
        Zip::from(&mut r)
            .and(&mut g)
            .and(&mut b)
            .for_each(|r, g, b| f(r, g, b));
    }
}

/// Adds `std * N(0, 1)` independently to every element.
#[derive(Debug, Clone, Copy)]
pub struct GaussianNoise {
    pub std: f32,
}

impl GaussianNoise {
    pub fn new(std: f32) -> Self {
        Self { std }
    }
}

impl Augmentation for GaussianNoise {
    fn apply(&self, batch: &mut Array4<f32>, rng: &mut dyn RngCore) {
        let std = self.std;
        batch.mapv_inplace(|v| {
            let z: f32 = StandardNormal.sample(&mut *rng);
            v + std * z
        });
    }
}

/// Replaces every channel with the pixel luma with probability `p`.
#[derive(Debug, Clone, Copy)]
pub struct RandomGrayscale {
    pub p: f32,
}

impl RandomGrayscale {
    pub fn new(p: f32) -> Self {
        Self { p }
    }

    pub fn grayscale(batch: &mut Array4<f32>) {
        for_each_pixel(batch, |r, g, b| {
            let l = luma(*r, *g, *b);
            (*r, *g, *b) = (l, l, l);
        });
    }
}

impl Augmentation for RandomGrayscale {
    fn apply(&self, batch: &mut Array4<f32>, rng: &mut dyn RngCore) {
        if rng.gen::<f32>() < self.p {
            Self::grayscale(batch);
        }
    }
}

/// One color adjustment with its drawn strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorOp {
    Brightness(f32),
    Contrast(f32),
    Saturation(f32),
    /// Hue rotation as a fraction of a full turn.
    Hue(f32),
}

impl ColorOp {
    /// Apply to a batch with values in [0, 1]; results are clamped to [0, 1].
    pub fn apply(self, batch: &mut Array4<f32>) {
        match self {
            ColorOp::Brightness(factor) => {
                batch.mapv_inplace(|v| (v * factor).clamp(0.0, 1.0));
            }
            ColorOp::Contrast(factor) => {
                for mut image in batch.axis_iter_mut(Axis(0)) {
                    let (_, h, w) = image.dim();
                    let count = (h * w).max(1) as f32;
                    let mean = Zip::from(image.index_axis(Axis(0), 0))
                        .and(image.index_axis(Axis(0), 1))
                        .and(image.index_axis(Axis(0), 2))
                        .fold(0.0f32, |acc, &r, &g, &b| acc + luma(r, g, b))
                        / count;
                    image.mapv_inplace(|v| blend(v, mean, factor));
                }
            }
            ColorOp::Saturation(factor) => {
                for_each_pixel(batch, |r, g, b| {
                    let l = luma(*r, *g, *b);
                    *r = blend(*r, l, factor);
                    *g = blend(*g, l, factor);
                    *b = blend(*b, l, factor);
                });
            }
            ColorOp::Hue(shift) => {
                for_each_pixel(batch, |r, g, b| {
                    let (h, s, v) = rgb_to_hsv(*r, *g, *b);
                    let h = (h + shift).rem_euclid(1.0);
                    (*r, *g, *b) = hsv_to_rgb(h, s, v);
                });
            }
        }
    }
}

/// `factor * value + (1 - factor) * other`, clamped to [0, 1].
fn blend(value: f32, other: f32, factor: f32) -> f32 {
    (factor * value + (1.0 - factor) * other).clamp(0.0, 1.0)
}

/// Random brightness, contrast, saturation and hue changes in random order.
///
/// Brightness, contrast and saturation factors are drawn from
/// `[1 - x, 1 + x]`; the hue shift from `[-hue, hue]` (hue must be <= 0.5).
#[derive(Debug, Clone, Copy)]
pub struct ColorJitter {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
}

impl ColorJitter {
    pub fn new(brightness: f32, contrast: f32, saturation: f32, hue: f32) -> Self {
        Self {
            brightness,
            contrast,
            saturation,
            hue: hue.clamp(0.0, 0.5),
        }
    }

    /// Draw the ops to apply, in application order. Zero-strength ops are omitted.
    pub fn sample_ops<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<ColorOp> {
        let mut order = [0usize, 1, 2, 3];
        order.shuffle(&mut *rng);

        let factor = |rng: &mut R, x: f32| {
            let x = x.abs();
            rng.gen_range((1.0 - x).max(0.0)..=1.0 + x)
        };

        let mut ops = Vec::with_capacity(4);
        for idx in order {
            let op = match idx {
                0 if self.brightness != 0.0 => {
                    ColorOp::Brightness(factor(&mut *rng, self.brightness))
                }
                1 if self.contrast != 0.0 => ColorOp::Contrast(factor(&mut *rng, self.contrast)),
                2 if self.saturation != 0.0 => {
                    ColorOp::Saturation(factor(&mut *rng, self.saturation))
                }
                3 if self.hue != 0.0 => ColorOp::Hue(rng.gen_range(-self.hue..=self.hue)),
                _ => continue,
            };
            ops.push(op);
        }
        ops
    }
}

impl Augmentation for ColorJitter {
    fn apply(&self, batch: &mut Array4<f32>, rng: &mut dyn RngCore) {
        for op in self.sample_ops(rng) {
            op.apply(batch);
        }
    }
}

/// RGB in [0, 1] to (hue in [0, 1), saturation, value).
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;
    if chroma <= 0.0 {
        return (0.0, 0.0, max);
    }
    let s = if max > 0.0 { chroma / max } else { 0.0 };
    let h = if max == r {
        (g - b) / chroma
    } else if max == g {
        2.0 + (b - r) / chroma
    } else {
        4.0 + (r - g) / chroma
    };
    ((h / 6.0).rem_euclid(1.0), s, max)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = (v * (1.0 - s)).clamp(0.0, 1.0);
    let q = (v * (1.0 - s * f)).clamp(0.0, 1.0);
    let t = (v * (1.0 - s * (1.0 - f))).clamp(0.0, 1.0);
    match sector as i32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
