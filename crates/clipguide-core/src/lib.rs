//! clipguide core - CLIP scoring building blocks for guided image generation.
//!
//! A guidance loop repeatedly asks "how well does this candidate image match
//! the prompt?". This crate provides the pieces that answer it:
//!
//! ```text
//! Image (1,3,H,W) → MakeCutouts → Augment → Normalize → ClipModel → scores
//!                                                         ↑
//!                                             ModelCache (load once)
//! ```
//!
//! plus a [`SemanticRanker`] that ranks class labels (e.g. ImageNet) against
//! a query embedding.
//!
//! # Usage
//!
//! ```rust,ignore
//! use clipguide_core::{Config, MakeCutouts, ModelCache, SemanticRanker};
//! use rand::SeedableRng;
//!
//! let config = Config::load()?;
//! let mut cache = ModelCache::from_config(&config);
//! let (model, resolution) = cache.load("ViT-B/32", "cpu")?;
//!
//! let sampler = MakeCutouts::new(resolution as usize, 32, 1.0, true)?;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let cutouts = sampler.sample(&image, &mut rng)?;
//!
//! let prompt = model.encode_text(&["a watercolor fox".to_string()])?;
//! let scores = clipguide_core::score_cutouts(model.as_ref(), &cutouts, &prompt)?;
//! ```

pub mod config;
pub mod cutouts;
pub mod error;
pub mod math;
pub mod model;
pub mod ranking;
pub mod scoring;

pub use config::Config;
pub use cutouts::{AugmentationPipeline, ClipNormalize, CropWindow, MakeCutouts};
pub use error::{ConfigError, CutoutError, GuideError, ModelError, RankingError, Result};
pub use model::{ClipModel, Device, ModelCache, ModelHandle, ModelLoader, ModelName};
pub use ranking::{LabelEmbeddings, RankedLabel, SemanticRanker, Vocabulary};
pub use scoring::{score_cutouts, CutoutScores};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
