//! Bounded LRU cache of loaded models.
//!
//! Loading a CLIP model is expensive, and a guidance loop asks for the same
//! model on every step. The cache keeps at most `capacity` (model, device)
//! pairs alive and hands out clones of the same `Arc` on every hit.
//!
//! The cache is a plain owned value and `load` takes `&mut self`; callers that
//! share one across threads wrap it in their own lock.

use std::collections::VecDeque;
use std::path::Path;

use crate::config::Config;
use crate::error::ModelError;

use super::onnx::OnnxLoader;
use super::{Device, ModelHandle, ModelLoader, ModelName};

struct CacheEntry {
    name: ModelName,
    device: Device,
    handle: ModelHandle,
    resolution: u32,
}

/// Memoizing model accessor with bounded capacity (1 by default).
pub struct ModelCache {
    loader: Box<dyn ModelLoader>,
    capacity: usize,
    /// Least recently used at the front.
    entries: VecDeque<CacheEntry>,
}

impl ModelCache {
    /// Create a single-entry cache around `loader`.
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self::with_capacity(loader, 1)
    }

    /// Create a cache holding up to `capacity` models (minimum 1).
    pub fn with_capacity(loader: impl ModelLoader + 'static, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            loader: Box::new(loader),
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Create an ONNX-backed cache for the configured model directory.
    pub fn from_config(config: &Config) -> Self {
        Self::onnx(&config.model_dir(), config.model.cache_capacity)
    }

    /// Create an ONNX-backed cache rooted at `model_dir`.
    pub fn onnx(model_dir: &Path, capacity: usize) -> Self {
        Self::with_capacity(OnnxLoader::new(model_dir), capacity)
    }

    /// Return the model and its input resolution, loading it on a miss.
    ///
    /// Fails with a configuration error if `device` is not `cpu` or a `cuda`
    /// designator, or if `model_name` is not a supported identifier. Neither
    /// check touches the cache.
    pub fn load(
        &mut self,
        model_name: &str,
        device: &str,
    ) -> Result<(ModelHandle, u32), ModelError> {
        let device: Device = device.parse()?;
        let name: ModelName = model_name.parse()?;
        self.get_or_load(name, device)
    }

    /// Same as [`load`](Self::load) for already-parsed arguments.
    pub fn get_or_load(
        &mut self,
        name: ModelName,
        device: Device,
    ) -> Result<(ModelHandle, u32), ModelError> {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.name == name && e.device == device)
        {
            // Hit: move to the most-recently-used end.
            let entry = self.entries.remove(pos).ok_or_else(|| ModelError::Backend {
                model: name.to_string(),
                message: "cache entry vanished".to_string(),
            })?;
            let result = (entry.handle.clone(), entry.resolution);
            self.entries.push_back(entry);
            return Ok(result);
        }

        tracing::info!(model = %name, device = %device, "Loading clip model");
        let handle = self.loader.load(name, device)?;
        let resolution = handle.input_resolution();

        self.entries.push_back(CacheEntry {
            name,
            device,
            handle: handle.clone(),
            resolution,
        });
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::debug!(
                    model = %evicted.name,
                    device = %evicted.device,
                    "Evicted model from cache"
                );
            }
        }

        Ok((handle, resolution))
    }

    /// Whether a (name, device) pair is currently cached.
    pub fn contains(&self, name: ModelName, device: Device) -> bool {
        self.entries
            .iter()
            .any(|e| e.name == name && e.device == device)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every cached model.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
