//! CLIP inference through ONNX Runtime.
//!
//! Each model lives in `{model_dir}/{slug}/` as a visual encoder
//! (`visual.onnx`), a text encoder (`text.onnx`) and a HuggingFace
//! `tokenizer.json`. GPU loads prefer `*.fp16.onnx` exports when present.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::{Array2, Array4};
use ort::ep::CUDA;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

use crate::error::ModelError;

use super::{ClipModel, Device, LoadProfile, ModelHandle, ModelLoader, ModelName, Precision};

/// CLIP text context length (tokens per prompt, including SOT/EOT).
const CONTEXT_LENGTH: usize = 77;

const VISUAL_STEM: &str = "visual";
const TEXT_STEM: &str = "text";
const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Output names tried in order before falling back to the first output.
const IMAGE_OUTPUTS: &[&str] = &["image_embeds", "image_features", "embeddings", "pooler_output"];
const TEXT_OUTPUTS: &[&str] = &["text_embeds", "text_features", "embeddings", "pooler_output"];

/// One encoder session plus the IO names detected from its metadata.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
struct EncoderSession {
    session: Mutex<Session>,
    input_name: String,
    mask_name: Option<String>,
    output_name: String,
}

impl EncoderSession {
    fn load(
        path: &Path,
        model: ModelName,
        device: Device,
        inputs: &[&str],
        outputs: &[&str],
    ) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::MissingModelFile {
                path: path.to_path_buf(),
            });
        }

        let backend = |message: String| ModelError::Backend {
            model: model.to_string(),
            message,
        };

        let builder = Session::builder()
            .map_err(|e| backend(format!("Failed to create ONNX session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| backend(format!("Failed to set optimization level: {e}")))?;

        // No silent CPU fallback: a GPU request that cannot be honored fails.
        let builder = match device {
            Device::Cpu => builder,
            Device::Cuda { ordinal } => builder
                .with_execution_providers([CUDA::default()
                    .with_device_id(ordinal as i32)
                    .build()
                    .error_on_failure()])
                .map_err(|e| backend(format!("Failed to register CUDA provider: {e}")))?,
        };

        let session = builder
            .commit_from_file(path)
            .map_err(|e| backend(format!("Failed to load {:?}: {e}", path)))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        let input_name = pick_name(&input_names, inputs)
            .ok_or_else(|| backend(format!("{:?} has no inputs", path)))?;
        let mask_name = input_names
            .iter()
            .find(|n| n.as_str() == "attention_mask")
            .cloned();
        let output_name = pick_name(&output_names, outputs)
            .ok_or_else(|| backend(format!("{:?} has no outputs", path)))?;

        tracing::debug!(
            "Loaded {:?} (inputs: {:?}, outputs: {:?}, using {} -> {})",
            path,
            input_names,
            output_names,
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            mask_name,
            output_name,
        })
    }
}

/// First name in `preferred` that the model exposes, else its first name.
fn pick_name(available: &[String], preferred: &[&str]) -> Option<String> {
    preferred
        .iter()
        .find(|p| available.iter().any(|a| a == *p))
        .map(|p| p.to_string())
        .or_else(|| available.first().cloned())
}

/// Model file for `stem`, honoring the precision preference.
fn model_file(dir: &Path, stem: &str, precision: Precision) -> PathBuf {
    if precision == Precision::Native {
        let half = dir.join(format!("{stem}.fp16.onnx"));
        if half.exists() {
            return half;
        }
    }
    dir.join(format!("{stem}.onnx"))
}

/// Reshape a flat `[rows, dim]` output into an owned matrix.
fn embedding_matrix(
    model: ModelName,
    dims: &[i64],
    data: &[f32],
    rows: usize,
) -> Result<Array2<f32>, ModelError> {
    let dim = match dims.len() {
        2 => dims[1] as usize,
        1 if rows == 1 => data.len(),
        _ => {
            return Err(ModelError::Backend {
                model: model.to_string(),
                message: format!("Unexpected embedding output shape: {:?}", dims),
            })
        }
    };
    if data.len() < rows * dim {
        return Err(ModelError::Backend {
            model: model.to_string(),
            message: format!(
                "Embedding output holds {} values, expected {rows} x {dim}",
                data.len()
            ),
        });
    }
    Array2::from_shape_vec((rows, dim), data[..rows * dim].to_vec()).map_err(|e| {
        ModelError::Backend {
            model: model.to_string(),
            message: format!("Failed to reshape embeddings: {e}"),
        }
    })
}

/// A CLIP model served by ONNX Runtime.
pub struct OnnxClip {
    name: ModelName,
    device: Device,
    profile: LoadProfile,
    visual: EncoderSession,
    text: EncoderSession,
    tokenizer: tokenizers::Tokenizer,
}

impl OnnxClip {
    /// Load both encoders and the tokenizer from `{model_dir}/{slug}/`.
    pub fn load(model_dir: &Path, name: ModelName, device: Device) -> Result<Self, ModelError> {
        let dir = model_dir.join(name.slug());
        let profile = device.load_profile();

        let tokenizer_path = dir.join(TOKENIZER_FILENAME);
        if !tokenizer_path.exists() {
            return Err(ModelError::MissingModelFile {
                path: tokenizer_path,
            });
        }

        let visual = EncoderSession::load(
            &model_file(&dir, VISUAL_STEM, profile.precision),
            name,
            device,
            &["pixel_values", "image", "input"],
            IMAGE_OUTPUTS,
        )?;
        let text = EncoderSession::load(
            &model_file(&dir, TEXT_STEM, profile.precision),
            name,
            device,
            &["input_ids", "text"],
            TEXT_OUTPUTS,
        )?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            ModelError::Backend {
                model: name.to_string(),
                message: format!("Failed to load tokenizer: {e}"),
            }
        })?;

        tracing::info!(
            model = %name,
            device = %device,
            precision = ?profile.precision,
            frozen = profile.frozen,
            "CLIP model ready"
        );

        Ok(Self {
            name,
            device,
            profile,
            visual,
            text,
            tokenizer,
        })
    }

    /// Files a model needs on disk, in load order.
    pub fn required_files(model_dir: &Path, name: ModelName) -> Vec<PathBuf> {
        let dir = model_dir.join(name.slug());
        vec![
            dir.join(format!("{VISUAL_STEM}.onnx")),
            dir.join(format!("{TEXT_STEM}.onnx")),
            dir.join(TOKENIZER_FILENAME),
        ]
    }

    /// Check whether all model files exist.
    pub fn model_exists(model_dir: &Path, name: ModelName) -> bool {
        Self::required_files(model_dir, name)
            .iter()
            .all(|p| p.exists())
    }

    pub fn load_profile(&self) -> LoadProfile {
        self.profile
    }

    fn backend_error(&self, message: String) -> ModelError {
        ModelError::Backend {
            model: self.name.to_string(),
            message,
        }
    }

    /// Tokenize into flat `[batch, CONTEXT_LENGTH]` ids and mask.
    ///
    /// Over-long prompts are truncated with their final (end-of-text) token kept.
    fn tokenize(&self, texts: &[String]) -> Result<(Vec<i64>, Vec<i64>), ModelError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| self.backend_error(format!("Tokenization failed: {e}")))?;

        let mut input_ids = vec![0i64; texts.len() * CONTEXT_LENGTH];
        let mut mask = vec![0i64; texts.len() * CONTEXT_LENGTH];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let len = ids.len().min(CONTEXT_LENGTH);
            let row = i * CONTEXT_LENGTH;
            for (j, &id) in ids.iter().take(len).enumerate() {
                input_ids[row + j] = i64::from(id);
                mask[row + j] = 1;
            }
            if ids.len() > CONTEXT_LENGTH {
                if let Some(&eot) = ids.last() {
                    input_ids[row + CONTEXT_LENGTH - 1] = i64::from(eot);
                }
            }
        }

        Ok((input_ids, mask))
    }
}

impl ClipModel for OnnxClip {
    fn model_name(&self) -> ModelName {
        self.name
    }

    fn device(&self) -> Device {
        self.device
    }

    fn encode_image(&self, batch: &Array4<f32>) -> Result<Array2<f32>, ModelError> {
        let (n, c, h, w) = batch.dim();
        let res = self.input_resolution() as usize;
        if c != 3 || h != res || w != res {
            return Err(self.backend_error(format!(
                "Expected image batch (N, 3, {res}, {res}), got {:?}",
                batch.shape()
            )));
        }
        if n == 0 {
            return Ok(Array2::zeros((0, 0)));
        }

        let shape: Vec<i64> = batch.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = batch.iter().copied().collect();
        let input_value = Value::from_array((shape, flat_data))
            .map_err(|e| self.backend_error(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .visual
            .session
            .lock()
            .map_err(|e| self.backend_error(format!("Session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![self.visual.input_name.as_str() => input_value])
            .map_err(|e| self.backend_error(format!("Image encoder inference failed: {e}")))?;

        let output = outputs
            .iter()
            .find(|(name, _)| *name == self.visual.output_name.as_str())
            .ok_or_else(|| self.backend_error("Image encoder produced no embeddings".into()))?;

        let (shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| self.backend_error(format!("Failed to extract embeddings: {e}")))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        embedding_matrix(self.name, &dims, data, n)
    }

    fn encode_text(&self, texts: &[String]) -> Result<Array2<f32>, ModelError> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }
        let batch_size = texts.len();
        let (input_ids, mask) = self.tokenize(texts)?;
        let shape = vec![batch_size as i64, CONTEXT_LENGTH as i64];

        let ids_value = Value::from_array((shape.clone(), input_ids))
            .map_err(|e| self.backend_error(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .text
            .session
            .lock()
            .map_err(|e| self.backend_error(format!("Text encoder lock poisoned: {e}")))?;

        let outputs = if let Some(mask_name) = &self.text.mask_name {
            let mask_value = Value::from_array((shape, mask))
                .map_err(|e| self.backend_error(format!("Failed to create mask tensor: {e}")))?;
            session.run(ort::inputs![
                self.text.input_name.as_str() => ids_value,
                mask_name.as_str() => mask_value
            ])
        } else {
            session.run(ort::inputs![self.text.input_name.as_str() => ids_value])
        }
        .map_err(|e| self.backend_error(format!("Text encoder inference failed: {e}")))?;

        let output = outputs
            .iter()
            .find(|(name, _)| *name == self.text.output_name.as_str())
            .ok_or_else(|| self.backend_error("Text encoder produced no embeddings".into()))?;

        let (shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| self.backend_error(format!("Failed to extract embeddings: {e}")))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        embedding_matrix(self.name, &dims, data, batch_size)
    }
}

/// Production [`ModelLoader`] reading ONNX exports from a model directory.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    model_dir: PathBuf,
}

impl OnnxLoader {
    pub fn new(model_dir: &Path) -> Self {
        Self {
            model_dir: model_dir.to_path_buf(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}

impl ModelLoader for OnnxLoader {
    fn load(&self, name: ModelName, device: Device) -> Result<ModelHandle, ModelError> {
        let model = OnnxClip::load(&self.model_dir, name, device)?;
        Ok(Arc::new(model))
    }
}
