//! Randomized augmentation pipeline applied to cutout batches.
//!
//! Every step operates on a whole (N, 3, H, W) batch. Geometric and color
//! parameters are drawn once per call and shared by all cutouts in the
//! batch; Gaussian noise is drawn per element.
//!
//! Steps are named so callers can toggle or seed them individually:
//!
//! ```rust,ignore
//! let mut pipeline = AugmentationPipeline::standard();
//! pipeline.set_enabled("perspective", false);
//! pipeline.set_seed("color_jitter", Some(7));
//! ```

mod geometric;
mod photometric;

use std::fmt;

use ndarray::Array4;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

pub use geometric::{HorizontalFlip, RandomAffine, RandomPerspective};
pub use photometric::{ColorJitter, GaussianNoise, RandomGrayscale};

/// Noise level inserted between the standard steps.
pub const STANDARD_NOISE_STD: f32 = 0.01;

/// A batch transform.
pub trait Augmentation: fmt::Debug + Send + Sync {
    /// Transform the batch in place, drawing randomness from `rng`.
    fn apply(&self, batch: &mut Array4<f32>, rng: &mut dyn RngCore);
}

/// A named, toggleable pipeline entry.
#[derive(Debug)]
pub struct AugmentationStep {
    pub name: &'static str,
    pub enabled: bool,
    /// When set, the step draws from its own `StdRng` seeded with this value
    /// instead of the caller's generator.
    pub seed: Option<u64>,
    pub transform: Box<dyn Augmentation>,
}

impl AugmentationStep {
    pub fn new(name: &'static str, transform: impl Augmentation + 'static) -> Self {
        Self {
            name,
            enabled: true,
            seed: None,
            transform: Box::new(transform),
        }
    }

    fn run<R: Rng>(&self, batch: &mut Array4<f32>, rng: &mut R) {
        match self.seed {
            Some(seed) => {
                let mut own = StdRng::seed_from_u64(seed);
                self.transform.apply(batch, &mut own);
            }
            None => self.transform.apply(batch, rng),
        }
    }
}

/// Ordered list of augmentation steps.
#[derive(Debug, Default)]
pub struct AugmentationPipeline {
    steps: Vec<AugmentationStep>,
}

impl AugmentationPipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip, affine, perspective, grayscale and color jitter, each followed by
    /// Gaussian noise with σ = 0.01.
    pub fn standard() -> Self {
        let noise = || GaussianNoise::new(STANDARD_NOISE_STD);
        let mut pipeline = Self::new();
        pipeline.push(AugmentationStep::new("flip", HorizontalFlip::new(0.5)));
        pipeline.push(AugmentationStep::new("noise_after_flip", noise()));
        pipeline.push(AugmentationStep::new("affine", RandomAffine::new(15.0, (0.1, 0.1))));
        pipeline.push(AugmentationStep::new("noise_after_affine", noise()));
        pipeline.push(AugmentationStep::new(
            "perspective",
            RandomPerspective::new(0.4, 0.7),
        ));
        pipeline.push(AugmentationStep::new("noise_after_perspective", noise()));
        pipeline.push(AugmentationStep::new("grayscale", RandomGrayscale::new(0.15)));
        pipeline.push(AugmentationStep::new("noise_after_grayscale", noise()));
        pipeline.push(AugmentationStep::new(
            "color_jitter",
            ColorJitter::new(0.1, 0.1, 0.1, 0.1),
        ));
        pipeline.push(AugmentationStep::new("noise_after_color_jitter", noise()));
        pipeline
    }

    pub fn push(&mut self, step: AugmentationStep) {
        self.steps.push(step);
    }

    /// Enable or disable a step by name. Returns false if no step matched.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        self.step_mut(name).map(|s| s.enabled = enabled).is_some()
    }

    /// Pin a step to its own seed, or `None` to use the caller's generator.
    pub fn set_seed(&mut self, name: &str, seed: Option<u64>) -> bool {
        self.step_mut(name).map(|s| s.seed = seed).is_some()
    }

    pub fn step(&self, name: &str) -> Option<&AugmentationStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    fn step_mut(&mut self, name: &str) -> Option<&mut AugmentationStep> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every enabled step in order.
    pub fn apply<R: Rng>(&self, batch: &mut Array4<f32>, rng: &mut R) {
        for step in self.steps.iter().filter(|s| s.enabled) {
            tracing::trace!(step = step.name, "Applying augmentation");
            step.run(batch, rng);
        }
    }

    /// Run a single step regardless of its enabled flag.
    pub fn apply_step<R: Rng>(&self, name: &str, batch: &mut Array4<f32>, rng: &mut R) -> bool {
        match self.step(name) {
            Some(step) => {
                step.run(batch, rng);
                true
            }
            None => false,
        }
    }
}
