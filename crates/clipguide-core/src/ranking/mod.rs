//! Zero-shot ranking of class labels against query embeddings.
//!
//! Each label is wrapped in a prompt template, encoded with the CLIP text
//! encoder and compared to the query by cosine similarity. Similarities are
//! scaled by the logit scale and turned into a probability distribution over
//! the vocabulary with a softmax.

mod embeddings;
mod vocabulary;

use ndarray::Array2;
use serde::Serialize;

use crate::config::RankingConfig;
use crate::error::RankingError;
use crate::math::{l2_normalize_rows, softmax};
use crate::model::ClipModel;

pub use embeddings::{LabelEmbeddings, DEFAULT_BATCH_SIZE};
pub use vocabulary::Vocabulary;

/// Placeholder substituted by each label.
pub const LABEL_PLACEHOLDER: &str = "{label}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "an image of a {label}";

/// CLIP's learned temperature, rounded.
pub const DEFAULT_LOGIT_SCALE: f32 = 100.0;

/// A ranked vocabulary entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLabel {
    pub index: usize,
    pub label: String,
    pub probability: f32,
}

/// Ranks vocabulary labels by similarity to a query embedding.
#[derive(Debug, Clone)]
pub struct SemanticRanker {
    prompt_template: String,
    logit_scale: f32,
    batch_size: usize,
}

impl Default for SemanticRanker {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_TEMPLATE, DEFAULT_LOGIT_SCALE)
    }
}

impl SemanticRanker {
    pub fn new(prompt_template: impl Into<String>, logit_scale: f32) -> Self {
        Self {
            prompt_template: prompt_template.into(),
            logit_scale,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.prompt_template.clone(), config.logit_scale)
    }

    /// Prompts per text-encoder call when encoding a vocabulary.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    pub fn logit_scale(&self) -> f32 {
        self.logit_scale
    }

    /// Fill the template for one label.
    pub fn prompt_for(&self, label: &str) -> String {
        self.prompt_template.replace(LABEL_PLACEHOLDER, label)
    }

    pub fn prompts<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        labels.iter().map(|l| self.prompt_for(l.as_ref())).collect()
    }

    /// Encode a vocabulary once for repeated ranking.
    pub fn encode_labels<S: AsRef<str>>(
        &self,
        model: &dyn ClipModel,
        labels: &[S],
    ) -> Result<LabelEmbeddings, RankingError> {
        let owned: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        let prompts = self.prompts(labels);
        LabelEmbeddings::encode(model, owned, &prompts, self.batch_size)
    }

    /// Indices of the `n` labels most similar to the first query row, best
    /// first. `None` ranks the whole vocabulary.
    ///
    /// The vocabulary is encoded on every call; see [`top_n_encoded`](Self::top_n_encoded)
    /// to reuse an encoding.
    pub fn top_n<S: AsRef<str>>(
        &self,
        query: &Array2<f32>,
        vocabulary: &[S],
        model: &dyn ClipModel,
        n: Option<usize>,
    ) -> Result<Vec<usize>, RankingError> {
        if query.nrows() == 0 {
            return Err(RankingError::EmptyQuery);
        }
        if vocabulary.is_empty() {
            return Err(RankingError::EmptyVocabulary);
        }
        check_count(n, vocabulary.len())?;

        let labels = self.encode_labels(model, vocabulary)?;
        self.top_n_encoded(query, &labels, n)
    }

    /// Same as [`top_n`](Self::top_n) against pre-encoded labels.
    pub fn top_n_encoded(
        &self,
        query: &Array2<f32>,
        labels: &LabelEmbeddings,
        n: Option<usize>,
    ) -> Result<Vec<usize>, RankingError> {
        let n = check_count(n, labels.len())?;
        Ok(self
            .rank(query, labels)?
            .into_iter()
            .take(n)
            .map(|(index, _)| index)
            .collect())
    }

    /// Top `n` labels with their probabilities.
    pub fn ranked_labels(
        &self,
        query: &Array2<f32>,
        labels: &LabelEmbeddings,
        n: Option<usize>,
    ) -> Result<Vec<RankedLabel>, RankingError> {
        let n = check_count(n, labels.len())?;
        Ok(self
            .rank(query, labels)?
            .into_iter()
            .take(n)
            .map(|(index, probability)| RankedLabel {
                index,
                label: labels.labels()[index].clone(),
                probability,
            })
            .collect())
    }

    /// Every (label index, probability) for the first query row, sorted by
    /// descending probability. Ties keep vocabulary order.
    pub fn rank(
        &self,
        query: &Array2<f32>,
        labels: &LabelEmbeddings,
    ) -> Result<Vec<(usize, f32)>, RankingError> {
        let probs = self.probabilities(query, labels)?;
        let mut ranked: Vec<(usize, f32)> = probs.row(0).iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }

    /// Softmax over the vocabulary of `logit_scale * cos(query, label)`, one
    /// row per query.
    pub fn probabilities(
        &self,
        query: &Array2<f32>,
        labels: &LabelEmbeddings,
    ) -> Result<Array2<f32>, RankingError> {
        if query.nrows() == 0 {
            return Err(RankingError::EmptyQuery);
        }
        if labels.is_empty() {
            return Err(RankingError::EmptyVocabulary);
        }
        if query.ncols() != labels.dim() {
            return Err(RankingError::DimensionMismatch {
                query: query.ncols(),
                labels: labels.dim(),
            });
        }

        let mut query = query.to_owned();
        l2_normalize_rows(&mut query);

        let mut logits = query.dot(&labels.matrix().t());
        logits.mapv_inplace(|x| x * self.logit_scale);

        for mut row in logits.rows_mut() {
            let probs = softmax(&row.to_vec());
            row.iter_mut().zip(probs).for_each(|(dst, p)| *dst = p);
        }
        Ok(logits)
    }
}

/// Resolve `n` against the vocabulary size.
fn check_count(n: Option<usize>, available: usize) -> Result<usize, RankingError> {
    match n {
        Some(requested) if requested > available => Err(RankingError::TooMany {
            requested,
            available,
        }),
        Some(requested) => Ok(requested),
        None => Ok(available),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::{Device, ModelName};
    use ndarray::{array, Array4};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Text encoder with a fixed prompt -> embedding table.
    struct TableModel {
        table: HashMap<String, Vec<f32>>,
        text_calls: AtomicUsize,
    }

    impl TableModel {
        fn animals() -> Self {
            let table = [
                ("an image of a cat", vec![0.9, 0.3, 0.1]),
                ("an image of a dog", vec![0.2, 0.95, 0.1]),
                ("an image of a car", vec![0.1, 0.1, 1.0]),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
            Self {
                table,
                text_calls: AtomicUsize::new(0),
            }
        }
    }

    impl ClipModel for TableModel {
        fn model_name(&self) -> ModelName {
            ModelName::VitB32
        }

        fn device(&self) -> Device {
            Device::Cpu
        }

        fn encode_image(&self, batch: &Array4<f32>) -> Result<Array2<f32>, ModelError> {
            Ok(Array2::zeros((batch.shape()[0], 3)))
        }

        fn encode_text(&self, texts: &[String]) -> Result<Array2<f32>, ModelError> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            let mut out = Array2::zeros((texts.len(), 3));
            for (i, text) in texts.iter().enumerate() {
                let v = self.table.get(text).ok_or_else(|| ModelError::Backend {
                    model: "table".to_string(),
                    message: format!("unknown prompt {text:?}"),
                })?;
                for (j, x) in v.iter().enumerate() {
                    out[[i, j]] = *x;
                }
            }
            Ok(out)
        }
    }

    const VOCAB: [&str; 3] = ["cat", "dog", "car"];

    #[test]
    fn test_query_matching_dog_prompt_ranks_dog_first() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        // Same direction as the dog prompt, different magnitude.
        let query = array![[0.4, 1.9, 0.2]];
        let top = ranker.top_n(&query, &VOCAB, &model, Some(1)).unwrap();
        assert_eq!(top, vec![1]);
    }

    #[test]
    fn test_full_ranking_is_permutation() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let query = array![[0.5, 0.5, 0.5]];
        let mut all = ranker
            .top_n(&query, &VOCAB, &model, Some(VOCAB.len()))
            .unwrap();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2]);

        let default_n = ranker.top_n(&query, &VOCAB, &model, None).unwrap();
        assert_eq!(default_n.len(), 3);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let query = array![[0.3, 0.2, 0.7]];
        let a = ranker.top_n(&query, &VOCAB, &model, None).unwrap();
        let b = ranker.top_n(&query, &VOCAB, &model, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0], 2);
    }

    #[test]
    fn test_only_first_query_row_is_ranked() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let query = array![[0.9, 0.3, 0.1], [0.1, 0.1, 1.0]];
        let top = ranker.top_n(&query, &VOCAB, &model, Some(1)).unwrap();
        assert_eq!(top, vec![0]);
    }

    #[test]
    fn test_too_many_fails_before_encoding() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let query = array![[1.0, 0.0, 0.0]];
        let err = ranker.top_n(&query, &VOCAB, &model, Some(4)).unwrap_err();
        assert!(matches!(
            err,
            RankingError::TooMany {
                requested: 4,
                available: 3
            }
        ));
        assert!(err.is_configuration());
        assert_eq!(model.text_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let query = array![[1.0, 0.0]];
        let err = ranker.top_n(&query, &VOCAB, &model, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            RankingError::DimensionMismatch {
                query: 2,
                labels: 3
            }
        ));
    }

    #[test]
    fn test_empty_inputs() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let empty_query = Array2::<f32>::zeros((0, 3));
        assert!(matches!(
            ranker.top_n(&empty_query, &VOCAB, &model, None),
            Err(RankingError::EmptyQuery)
        ));
        let no_labels: [&str; 0] = [];
        assert!(matches!(
            ranker.top_n(&array![[1.0, 0.0, 0.0]], &no_labels, &model, None),
            Err(RankingError::EmptyVocabulary)
        ));
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let labels = ranker.encode_labels(&model, &VOCAB).unwrap();
        let probs = ranker
            .probabilities(&array![[0.2, 0.4, 0.6], [1.0, 0.0, 0.0]], &labels)
            .unwrap();
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_ties_keep_vocabulary_order() {
        let labels = LabelEmbeddings::from_matrix(
            vec!["a".into(), "b".into(), "c".into()],
            array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]],
        )
        .unwrap();
        let ranker = SemanticRanker::default();
        let top = ranker
            .top_n_encoded(&array![[1.0, 0.0]], &labels, None)
            .unwrap();
        assert_eq!(top, vec![0, 2, 1]);
    }

    #[test]
    fn test_encoded_labels_are_reused() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let labels = ranker.encode_labels(&model, &VOCAB).unwrap();
        for _ in 0..3 {
            ranker
                .top_n_encoded(&array![[0.0, 1.0, 0.0]], &labels, Some(2))
                .unwrap();
        }
        assert_eq!(model.text_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ranked_labels_carry_names() {
        let model = TableModel::animals();
        let ranker = SemanticRanker::default();
        let labels = ranker.encode_labels(&model, &VOCAB).unwrap();
        let ranked = ranker
            .ranked_labels(&array![[0.1, 0.1, 1.0]], &labels, Some(2))
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].label, "car");
        assert!(ranked[0].probability > ranked[1].probability);
    }

    #[test]
    fn test_custom_template() {
        let ranker = SemanticRanker::new("a photo of {label}, {label}", 10.0);
        assert_eq!(ranker.prompt_for("fox"), "a photo of fox, fox");
        assert_eq!(ranker.logit_scale(), 10.0);
    }
}
