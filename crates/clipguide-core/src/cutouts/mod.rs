//! Random cutout sampling for robust CLIP scoring.
//!
//! A guidance loop scores many random square crops ("cutouts") of the
//! candidate image instead of the image itself. Each crop is pooled to the
//! model resolution so the batch has a uniform shape, then optionally passed
//! through a randomized [`AugmentationPipeline`].
//!
//! ```rust,ignore
//! use clipguide_core::cutouts::MakeCutouts;
//! use rand::SeedableRng;
//!
//! let sampler = MakeCutouts::new(224, 32, 1.0, true)?;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let batch = sampler.sample(&image, &mut rng)?; // (32, 3, 224, 224)
//! ```

pub mod augment;
pub mod normalize;
pub mod pool;

use ndarray::{s, Array4, Axis};
use rand::Rng;

use crate::config::CutoutConfig;
use crate::error::CutoutError;

pub use augment::AugmentationPipeline;
pub use normalize::ClipNormalize;

/// One sampled square crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    /// Column offset of the left edge.
    pub x: usize,
    /// Row offset of the top edge.
    pub y: usize,
    /// Side length.
    pub size: usize,
}

impl CropWindow {
    /// Draw a crop window for a `height x width` image.
    ///
    /// `size = floor(u^power * (max_size - min_size) + min_size)` with
    /// `u ~ U[0, 1)`, `max_size = min(h, w)` and `min_size = min(h, w, cut_size)`.
    /// Offsets are uniform over every position that keeps the crop inside
    /// the image.
    pub fn sample<R: Rng + ?Sized>(
        height: usize,
        width: usize,
        cut_size: usize,
        power: f32,
        rng: &mut R,
    ) -> Result<Self, CutoutError> {
        let max_size = height.min(width);
        let min_size = max_size.min(cut_size);
        if min_size == 0 {
            return Err(CutoutError::DegenerateGeometry {
                height,
                width,
                cut_size,
            });
        }

        let u: f64 = rng.gen();
        let span = (max_size - min_size) as f64;
        let size = (u.powf(f64::from(power)) * span + min_size as f64).floor() as usize;
        let size = size.clamp(min_size, max_size);

        let x = rng.gen_range(0..=width - size);
        let y = rng.gen_range(0..=height - size);

        Ok(Self { x, y, size })
    }

    /// Whether the window lies fully inside a `height x width` image.
    pub fn fits(&self, height: usize, width: usize) -> bool {
        self.size > 0 && self.x + self.size <= width && self.y + self.size <= height
    }
}

/// Produces batches of randomly sized, randomly placed square cutouts.
#[derive(Debug)]
pub struct MakeCutouts {
    cut_size: usize,
    num_cutouts: usize,
    cutout_size_power: f32,
    augmentations: Option<AugmentationPipeline>,
}

impl MakeCutouts {
    /// Create a sampler. `use_augs` attaches the standard augmentation pipeline.
    pub fn new(
        cut_size: usize,
        num_cutouts: usize,
        cutout_size_power: f32,
        use_augs: bool,
    ) -> Result<Self, CutoutError> {
        if cut_size == 0 {
            return Err(CutoutError::InvalidParameters("cut_size must be > 0".into()));
        }
        if num_cutouts == 0 {
            return Err(CutoutError::InvalidParameters(
                "num_cutouts must be > 0".into(),
            ));
        }
        if !cutout_size_power.is_finite() || cutout_size_power <= 0.0 {
            return Err(CutoutError::InvalidParameters(format!(
                "cutout_size_power must be positive, got {cutout_size_power}"
            )));
        }

        Ok(Self {
            cut_size,
            num_cutouts,
            cutout_size_power,
            augmentations: use_augs.then(AugmentationPipeline::standard),
        })
    }

    /// Create a sampler from the `[cutouts]` config section.
    pub fn from_config(config: &CutoutConfig) -> Result<Self, CutoutError> {
        Self::new(
            config.cut_size,
            config.num_cutouts,
            config.cutout_size_power,
            config.augment,
        )
    }

    /// Replace the augmentation pipeline.
    pub fn with_augmentations(mut self, pipeline: AugmentationPipeline) -> Self {
        self.augmentations = Some(pipeline);
        self
    }

    /// Drop the augmentation pipeline.
    pub fn without_augmentations(mut self) -> Self {
        self.augmentations = None;
        self
    }

    pub fn augmentations(&self) -> Option<&AugmentationPipeline> {
        self.augmentations.as_ref()
    }

    /// Mutable access, e.g. to toggle individual steps.
    pub fn augmentations_mut(&mut self) -> Option<&mut AugmentationPipeline> {
        self.augmentations.as_mut()
    }

    pub fn cut_size(&self) -> usize {
        self.cut_size
    }

    pub fn num_cutouts(&self) -> usize {
        self.num_cutouts
    }

    pub fn cutout_size_power(&self) -> f32 {
        self.cutout_size_power
    }

    /// Draw `num_cutouts` crop windows for a `height x width` image.
    pub fn sample_windows<R: Rng + ?Sized>(
        &self,
        height: usize,
        width: usize,
        rng: &mut R,
    ) -> Result<Vec<CropWindow>, CutoutError> {
        (0..self.num_cutouts)
            .map(|_| CropWindow::sample(height, width, self.cut_size, self.cutout_size_power, rng))
            .collect()
    }

    /// Sample a (num_cutouts, 3, cut_size, cut_size) batch from a (1, 3, H, W) image.
    pub fn sample<R: Rng>(
        &self,
        image: &Array4<f32>,
        rng: &mut R,
    ) -> Result<Array4<f32>, CutoutError> {
        let (batch, channels, height, width) = image.dim();
        if batch != 1 || channels != 3 {
            return Err(CutoutError::InvalidShape {
                shape: image.shape().to_vec(),
            });
        }

        let windows = self.sample_windows(height, width, rng)?;
        tracing::trace!(?windows, "Sampled cutout windows");

        let mut cutouts = Array4::<f32>::zeros((self.num_cutouts, 3, self.cut_size, self.cut_size));
        for (mut slot, window) in cutouts.axis_iter_mut(Axis(0)).zip(&windows) {
            let crop = image.slice(s![
                0,
                ..,
                window.y..window.y + window.size,
                window.x..window.x + window.size
            ]);
            pool::adaptive_avg_pool2d_into(&crop, &mut slot);
        }

        if let Some(augs) = &self.augmentations {
            augs.apply(&mut cutouts, rng);
        }

        Ok(cutouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient_image(height: usize, width: usize) -> Array4<f32> {
        Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
            (c as f32 * 0.1) + (y * width + x) as f32 / (height * width) as f32
        })
    }

    fn mean_size(power: f32, trials: usize, seed: u64) -> f64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let total: usize = (0..trials)
            .map(|_| CropWindow::sample(200, 300, 50, power, &mut rng).unwrap().size)
            .sum();
        total as f64 / trials as f64
    }

    #[test]
    fn test_batch_shape_for_various_images() {
        let sampler = MakeCutouts::new(16, 5, 1.0, false).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for (h, w) in [(1, 1), (3, 50), (64, 64), (17, 90), (200, 31)] {
            let out = sampler.sample(&gradient_image(h, w), &mut rng).unwrap();
            assert_eq!(out.shape(), &[5, 3, 16, 16], "image {h}x{w}");
        }
    }

    #[test]
    fn test_batch_shape_with_augmentations() {
        let sampler = MakeCutouts::new(24, 4, 1.0, true).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let out = sampler.sample(&gradient_image(40, 60), &mut rng).unwrap();
        assert_eq!(out.shape(), &[4, 3, 24, 24]);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_windows_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for (h, w, cut) in [(10, 10, 4), (7, 300, 224), (300, 7, 3), (1, 1, 224), (50, 80, 80)] {
            for power in [0.5, 1.0, 3.0] {
                for _ in 0..200 {
                    let win = CropWindow::sample(h, w, cut, power, &mut rng).unwrap();
                    assert!(win.fits(h, w), "{win:?} outside {h}x{w}");
                    assert!(win.size <= h.min(w));
                    assert!(win.size >= h.min(w).min(cut));
                }
            }
        }
    }

    #[test]
    fn test_uniform_power_mean_is_midpoint() {
        // min_size = 50, max_size = 200; floor() shifts the mean down by ~0.5.
        let mean = mean_size(1.0, 20_000, 4);
        assert!((mean - 124.5).abs() < 2.0, "mean size {mean}");
    }

    #[test]
    fn test_higher_power_biases_toward_small_crops() {
        let uniform = mean_size(1.0, 5_000, 5);
        let skewed = mean_size(2.0, 5_000, 5);
        assert!(skewed < uniform, "{skewed} should be < {uniform}");
    }

    #[test]
    fn test_lower_power_biases_toward_large_crops() {
        let uniform = mean_size(1.0, 5_000, 6);
        let skewed = mean_size(0.5, 5_000, 6);
        assert!(skewed > uniform);
    }

    #[test]
    fn test_cut_size_larger_than_image_uses_full_side() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let win = CropWindow::sample(30, 40, 224, 1.0, &mut rng).unwrap();
            assert_eq!(win.size, 30);
            assert_eq!(win.y, 0);
            assert!(win.x <= 10);
        }
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let sampler = MakeCutouts::new(8, 3, 1.0, true).unwrap();
        let image = gradient_image(32, 32);
        let a = sampler
            .sample(&image, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = sampler
            .sample(&image, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_full_image_crop_matches_pooling() {
        // Square image no larger than cut_size: every crop is the whole image.
        let sampler = MakeCutouts::new(8, 2, 1.0, false).unwrap();
        let image = gradient_image(8, 8);
        let out = sampler
            .sample(&image, &mut StdRng::seed_from_u64(8))
            .unwrap();
        let expected = image.index_axis(Axis(0), 0);
        assert_eq!(out.index_axis(Axis(0), 0), expected);
        assert_eq!(out.index_axis(Axis(0), 1), expected);
    }

    #[test]
    fn test_rejects_zero_dimension_image() {
        let sampler = MakeCutouts::new(8, 2, 1.0, false).unwrap();
        let image = Array4::<f32>::zeros((1, 3, 0, 10));
        let err = sampler
            .sample(&image, &mut StdRng::seed_from_u64(9))
            .unwrap_err();
        assert!(matches!(err, CutoutError::DegenerateGeometry { .. }));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let sampler = MakeCutouts::new(8, 2, 1.0, false).unwrap();
        let image = Array4::<f32>::zeros((2, 3, 10, 10));
        let err = sampler
            .sample(&image, &mut StdRng::seed_from_u64(10))
            .unwrap_err();
        assert!(matches!(err, CutoutError::InvalidShape { .. }));
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(MakeCutouts::new(0, 1, 1.0, false).is_err());
        assert!(MakeCutouts::new(8, 0, 1.0, false).is_err());
        assert!(MakeCutouts::new(8, 1, 0.0, false).is_err());
        assert!(MakeCutouts::new(8, 1, -1.0, false).is_err());
        assert!(MakeCutouts::new(8, 1, f32::INFINITY, false).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = CutoutConfig {
            cut_size: 32,
            num_cutouts: 6,
            cutout_size_power: 2.0,
            augment: false,
            seed: None,
        };
        let sampler = MakeCutouts::from_config(&config).unwrap();
        assert_eq!(sampler.cut_size(), 32);
        assert_eq!(sampler.num_cutouts(), 6);
        assert_eq!(sampler.cutout_size_power(), 2.0);
        assert!(sampler.augmentations().is_none());
    }
}
