//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where exported models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.clipguide/models"),
        }
    }
}

/// Similarity model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier ("ViT-B/32", "RN50x4", ...)
    pub name: String,

    /// Compute device: "cpu" or a cuda designator ("cuda", "cuda:1")
    pub device: String,

    /// How many (model, device) pairs the model cache keeps loaded
    pub cache_capacity: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "ViT-B/32".to_string(),
            device: "cpu".to_string(),
            cache_capacity: 1,
        }
    }
}

/// Cutout sampler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoutConfig {
    /// Side length every cutout is pooled to.
    /// Should match the model's input resolution.
    pub cut_size: usize,

    /// Number of cutouts per sample call
    pub num_cutouts: usize,

    /// Size-distribution exponent. Values above 1.0 bias toward smaller crops.
    pub cutout_size_power: f32,

    /// Run the randomized augmentation pipeline over each batch
    pub augment: bool,

    /// Fixed RNG seed for reproducible sampling (random when unset)
    pub seed: Option<u64>,
}

impl Default for CutoutConfig {
    fn default() -> Self {
        Self {
            cut_size: 224,
            num_cutouts: 16,
            cutout_size_power: 1.0,
            augment: true,
            seed: None,
        }
    }
}

/// Semantic ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Prompt template; `{label}` is replaced by each vocabulary entry
    pub prompt_template: String,

    /// Multiplier applied to cosine similarities before the softmax
    pub logit_scale: f32,

    /// Default number of labels to report (full ranking when unset)
    pub top_n: Option<usize>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            prompt_template: "an image of a {label}".to_string(),
            logit_scale: 100.0,
            top_n: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
