//! Pre-computed label embeddings.
//!
//! Encoding a vocabulary is the expensive half of a ranking. Callers that
//! rank many queries against the same labels encode once here and reuse the
//! result with [`SemanticRanker::top_n_encoded`](super::SemanticRanker::top_n_encoded).

use ndarray::{concatenate, Array2, ArrayView2, Axis};

use crate::error::{ModelError, RankingError};
use crate::math::l2_normalize_rows;
use crate::model::ClipModel;

/// Prompts per `encode_text` call.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Unit-norm text embeddings, one row per label.
#[derive(Debug, Clone)]
pub struct LabelEmbeddings {
    labels: Vec<String>,
    matrix: Array2<f32>,
}

impl LabelEmbeddings {
    /// Encode `prompts` (already templated) through the model's text encoder.
    ///
    /// `labels` are kept alongside for reporting and must line up with `prompts`.
    pub fn encode(
        model: &dyn ClipModel,
        labels: Vec<String>,
        prompts: &[String],
        batch_size: usize,
    ) -> Result<Self, RankingError> {
        if prompts.is_empty() {
            return Err(RankingError::EmptyVocabulary);
        }
        let batch_size = batch_size.max(1);

        tracing::info!(
            model = %model.model_name(),
            labels = prompts.len(),
            "Encoding label vocabulary"
        );

        let mut chunks = Vec::with_capacity(prompts.len().div_ceil(batch_size));
        for chunk in prompts.chunks(batch_size) {
            let encoded = model.encode_text(chunk)?;
            if encoded.nrows() != chunk.len() {
                return Err(ModelError::Backend {
                    model: model.model_name().to_string(),
                    message: format!(
                        "text encoder returned {} rows for {} prompts",
                        encoded.nrows(),
                        chunk.len()
                    ),
                }
                .into());
            }
            chunks.push(encoded);
        }

        let views: Vec<ArrayView2<f32>> = chunks.iter().map(|c| c.view()).collect();
        let matrix = concatenate(Axis(0), &views).map_err(|e| ModelError::Backend {
            model: model.model_name().to_string(),
            message: format!("inconsistent text embedding widths: {e}"),
        })?;

        Self::from_matrix(labels, matrix)
    }

    /// Wrap an existing (labels, dim) matrix. Rows are L2-normalized.
    pub fn from_matrix(labels: Vec<String>, mut matrix: Array2<f32>) -> Result<Self, RankingError> {
        if matrix.nrows() == 0 {
            return Err(RankingError::EmptyVocabulary);
        }
        if labels.len() != matrix.nrows() {
            return Err(RankingError::Model(ModelError::Backend {
                model: "labels".to_string(),
                message: format!(
                    "{} labels but {} embedding rows",
                    labels.len(),
                    matrix.nrows()
                ),
            }));
        }
        l2_normalize_rows(&mut matrix);
        Ok(Self { labels, matrix })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    pub fn dim(&self) -> usize {
        self.matrix.ncols()
    }
}
