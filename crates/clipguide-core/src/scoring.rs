//! Cutout scoring against text prompts.
//!
//! This is the quantity a guidance loop optimizes: how well a batch of
//! cutouts of the candidate image matches each prompt, averaged over cutouts.

use ndarray::{Array2, Array4, Axis};
use serde::Serialize;

use crate::cutouts::ClipNormalize;
use crate::error::{CutoutError, GuideError, RankingError};
use crate::math::{l2_normalize_rows, spherical_distance};
use crate::model::ClipModel;

/// Per-prompt scores, averaged over all cutouts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutoutScores {
    pub num_cutouts: usize,
    /// Mean cosine similarity per prompt (higher is better).
    pub similarity: Vec<f32>,
    /// Mean spherical distance loss per prompt (lower is better).
    pub spherical_distance: Vec<f32>,
}

impl CutoutScores {
    /// Sum of the per-prompt spherical losses.
    pub fn total_loss(&self) -> f32 {
        self.spherical_distance.iter().sum()
    }
}

/// Score a (N, 3, R, R) cutout batch with values in [0, 1] against prompt
/// embeddings (one row per prompt). R must equal the model resolution.
pub fn score_cutouts(
    model: &dyn ClipModel,
    cutouts: &Array4<f32>,
    prompt_embeddings: &Array2<f32>,
) -> Result<CutoutScores, GuideError> {
    let (n, channels, height, width) = cutouts.dim();
    let resolution = model.input_resolution() as usize;
    if n == 0 || channels != 3 || height != resolution || width != resolution {
        return Err(CutoutError::InvalidShape {
            shape: cutouts.shape().to_vec(),
        }
        .into());
    }
    if prompt_embeddings.nrows() == 0 {
        return Err(RankingError::EmptyQuery.into());
    }

    let normalized = ClipNormalize::default().normalized(cutouts);
    let mut images = model.encode_image(&normalized)?;
    if images.ncols() != prompt_embeddings.ncols() {
        return Err(RankingError::DimensionMismatch {
            query: images.ncols(),
            labels: prompt_embeddings.ncols(),
        }
        .into());
    }
    l2_normalize_rows(&mut images);

    let mut prompts = prompt_embeddings.to_owned();
    l2_normalize_rows(&mut prompts);

    let similarity = images
        .dot(&prompts.t())
        .mean_axis(Axis(0))
        .map(|m| m.to_vec())
        .unwrap_or_default();

    let spherical = prompts
        .rows()
        .into_iter()
        .map(|prompt| {
            let total: f32 = images
                .rows()
                .into_iter()
                .map(|image| spherical_distance(image, prompt))
                .sum();
            total / images.nrows() as f32
        })
        .collect();

    tracing::debug!(cutouts = n, prompts = prompts.nrows(), "Scored cutout batch");

    Ok(CutoutScores {
        num_cutouts: n,
        similarity,
        spherical_distance: spherical,
    })
}
