//! Command implementations.

pub mod config;
pub mod cutouts;
pub mod image_io;
pub mod models;
pub mod rank;
pub mod score;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seeded generator when a seed is given, entropy-seeded otherwise.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            tracing::debug!(seed, "Using fixed RNG seed");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    }
}

/// Load a model through a fresh cache, with optional CLI overrides of the
/// configured name and device.
pub fn load_model(
    config: &clipguide_core::Config,
    model: Option<&str>,
    device: Option<&str>,
) -> anyhow::Result<(clipguide_core::ModelHandle, u32)> {
    let name = model.unwrap_or(&config.model.name);
    let device = device.unwrap_or(&config.model.device);
    let mut cache = clipguide_core::ModelCache::from_config(config);
    cache.load(name, device).map_err(|e| match e {
        clipguide_core::ModelError::MissingModelFile { .. } => anyhow::anyhow!(
            "{e}\nRun `clipguide models list` to see which models are installed."
        ),
        other => other.into(),
    })
}
