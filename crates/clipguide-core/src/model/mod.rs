//! CLIP similarity models: identifiers, devices, and the backend seam.
//!
//! A [`ClipModel`] turns image batches and text prompts into embeddings in a
//! shared space. Models are obtained through a [`ModelCache`], which delegates
//! the actual load to a [`ModelLoader`] (ONNX Runtime in production).

pub mod cache;
pub mod onnx;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::{Array2, Array4};

use crate::error::ModelError;

pub use cache::ModelCache;
pub use onnx::{OnnxClip, OnnxLoader};

/// Shared, immutable handle to a loaded model.
pub type ModelHandle = Arc<dyn ClipModel>;

/// The supported CLIP variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelName {
    VitB16,
    VitB32,
    Rn50,
    Rn101,
    Rn50x4,
    Rn50x16,
}

impl ModelName {
    /// Every supported variant, in canonical order.
    pub const ALL: [ModelName; 6] = [
        ModelName::VitB16,
        ModelName::VitB32,
        ModelName::Rn50,
        ModelName::Rn101,
        ModelName::Rn50x4,
        ModelName::Rn50x16,
    ];

    /// Canonical identifier, e.g. `ViT-B/32`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::VitB16 => "ViT-B/16",
            ModelName::VitB32 => "ViT-B/32",
            ModelName::Rn50 => "RN50",
            ModelName::Rn101 => "RN101",
            ModelName::Rn50x4 => "RN50x4",
            ModelName::Rn50x16 => "RN50x16",
        }
    }

    /// Square input resolution the visual encoder expects.
    pub fn input_resolution(&self) -> u32 {
        match self {
            ModelName::Rn50x4 => 288,
            ModelName::Rn50x16 => 384,
            _ => 224,
        }
    }

    /// Filesystem-safe directory name (`ViT-B/32` -> `vit-b-32`).
    pub fn slug(&self) -> String {
        self.as_str().replace('/', "-").to_lowercase()
    }

    /// Comma-separated list of supported identifiers, for error messages.
    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for ModelName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ModelError::UnsupportedModel {
                name: s.to_string(),
                supported: Self::supported(),
            })
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute device a model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Cuda { ordinal: u32 },
}

impl Device {
    /// How a model is prepared for this device.
    ///
    /// CPU models always run in full 32-bit precision. GPU models keep the
    /// export's native precision and are frozen for inference.
    pub fn load_profile(&self) -> LoadProfile {
        match self {
            Device::Cpu => LoadProfile {
                precision: Precision::Full32,
                frozen: false,
            },
            Device::Cuda { .. } => LoadProfile {
                precision: Precision::Native,
                frozen: true,
            },
        }
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self, Device::Cuda { .. })
    }
}

impl FromStr for Device {
    type Err = ModelError;

    /// Parse a designator: exactly `cpu`, or any string containing `cuda`
    /// optionally followed by `:<ordinal>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "cpu" {
            return Ok(Device::Cpu);
        }
        let Some(pos) = s.find("cuda") else {
            return Err(ModelError::InvalidDevice(s.to_string()));
        };
        let rest = &s[pos + "cuda".len()..];
        if rest.is_empty() {
            return Ok(Device::Cuda { ordinal: 0 });
        }
        rest.strip_prefix(':')
            .and_then(|n| n.parse::<u32>().ok())
            .map(|ordinal| Device::Cuda { ordinal })
            .ok_or_else(|| ModelError::InvalidDevice(s.to_string()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda { ordinal } => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Numeric precision a model is loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// 32-bit floating point weights.
    Full32,
    /// Whatever the export ships (half precision when available).
    Native,
}

/// Load-time preparation derived from the target device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProfile {
    pub precision: Precision,
    /// No parameter is trainable; the model is used for scoring only.
    pub frozen: bool,
}

/// A loaded vision-language similarity model.
///
/// Implementations must be usable from a shared reference; the ONNX backend
/// guards its sessions with a `Mutex`.
pub trait ClipModel: Send + Sync {
    fn model_name(&self) -> ModelName;

    fn device(&self) -> Device;

    /// Square input resolution of the visual encoder.
    fn input_resolution(&self) -> u32 {
        self.model_name().input_resolution()
    }

    /// Encode a normalized (N, 3, R, R) image batch into (N, D) embeddings.
    fn encode_image(&self, batch: &Array4<f32>) -> Result<Array2<f32>, ModelError>;

    /// Encode text prompts into (N, D) embeddings.
    fn encode_text(&self, texts: &[String]) -> Result<Array2<f32>, ModelError>;
}

/// Loads a model for a (name, device) pair. Injected into [`ModelCache`].
pub trait ModelLoader {
    fn load(&self, name: ModelName, device: Device) -> Result<ModelHandle, ModelError>;
}
