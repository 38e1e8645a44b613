//! Error types for the clipguide scoring subsystem.
//!
//! Errors are organized by component (config, model, cutouts, ranking) so
//! that callers can tell configuration mistakes apart from runtime failures.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for clipguide operations.
#[derive(Error, Debug)]
pub enum GuideError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model loading or inference errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Cutout sampling errors
    #[error("Cutout error: {0}")]
    Cutout(#[from] CutoutError),

    /// Semantic ranking errors
    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuideError {
    /// Whether this error stems from invalid configuration or arguments
    /// (as opposed to a runtime/backend failure).
    pub fn is_configuration(&self) -> bool {
        match self {
            GuideError::Config(_) => true,
            GuideError::Model(e) => e.is_configuration(),
            GuideError::Cutout(e) => matches!(e, CutoutError::InvalidParameters(_)),
            GuideError::Ranking(e) => e.is_configuration(),
            GuideError::Io(_) => false,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Model selection, loading and inference errors.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Device designator is neither `cpu` nor a `cuda` context
    #[error("Invalid or unspecified device: {0:?}")]
    InvalidDevice(String),

    /// Model identifier is not in the supported set
    #[error("Unsupported model {name:?} (supported: {supported})")]
    UnsupportedModel { name: String, supported: String },

    /// A required model file is missing on disk
    #[error("Model file not found: {path:?}. Export the model to ONNX and place it there.")]
    MissingModelFile { path: PathBuf },

    /// ONNX Runtime / tokenizer failure (includes device memory exhaustion)
    #[error("{model} backend error: {message}")]
    Backend { model: String, message: String },
}

impl ModelError {
    /// Whether the error was caused by a bad model name or device designator.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ModelError::InvalidDevice(_) | ModelError::UnsupportedModel { .. }
        )
    }
}

/// Cutout sampling errors.
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Sampler parameters are out of range
    #[error("Invalid cutout parameters: {0}")]
    InvalidParameters(String),

    /// Input tensor does not have shape (1, 3, H, W)
    #[error("Expected image tensor of shape (1, 3, H, W), got {shape:?}")]
    InvalidShape { shape: Vec<usize> },

    /// Sampling would produce a zero-size crop
    #[error("Degenerate cutout geometry: {height}x{width} image with cut size {cut_size}")]
    DegenerateGeometry {
        height: usize,
        width: usize,
        cut_size: usize,
    },
}

/// Semantic ranking errors.
#[derive(Error, Debug)]
pub enum RankingError {
    /// More results requested than vocabulary entries exist
    #[error("Requested top {requested} but vocabulary has only {available} labels")]
    TooMany { requested: usize, available: usize },

    /// Query and label embeddings live in different spaces
    #[error("Embedding dimension mismatch: query has {query}, labels have {labels}")]
    DimensionMismatch { query: usize, labels: usize },

    /// No query rows supplied
    #[error("Query embedding batch is empty")]
    EmptyQuery,

    /// No labels supplied
    #[error("Label vocabulary is empty")]
    EmptyVocabulary,

    /// Text encoding of the vocabulary failed
    #[error("Failed to encode vocabulary: {0}")]
    Model(#[from] ModelError),
}

impl RankingError {
    /// Whether the error was caused by invalid arguments.
    pub fn is_configuration(&self) -> bool {
        match self {
            RankingError::TooMany { .. } => true,
            RankingError::Model(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// Convenience type alias for clipguide results.
pub type Result<T> = std::result::Result<T, GuideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_device_is_configuration() {
        let err = GuideError::from(ModelError::InvalidDevice("tpu".into()));
        assert!(err.is_configuration());
        assert!(err.to_string().contains("tpu"));
    }

    #[test]
    fn test_backend_error_is_not_configuration() {
        let err = GuideError::from(ModelError::Backend {
            model: "ViT-B/32".into(),
            message: "out of memory".into(),
        });
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_too_many_is_configuration() {
        let err = GuideError::from(RankingError::TooMany {
            requested: 5,
            available: 3,
        });
        assert!(err.is_configuration());
        assert!(err.to_string().contains("top 5"));
    }

    #[test]
    fn test_degenerate_geometry_message() {
        let err = CutoutError::DegenerateGeometry {
            height: 0,
            width: 10,
            cut_size: 4,
        };
        assert!(err.to_string().contains("0x10"));
        assert!(!GuideError::from(err).is_configuration());
    }
}
