//! The `clipguide cutouts` command: sample cutouts and write them to disk.

use std::path::PathBuf;

use clap::Args;
use clipguide_core::config::CutoutConfig;
use clipguide_core::{Config, MakeCutouts};

use super::{image_io, make_rng};

/// Arguments for the `cutouts` command.
#[derive(Args, Debug)]
pub struct CutoutsArgs {
    /// Source image
    pub image: PathBuf,

    /// Output directory for the PNG cutouts
    #[arg(short, long, default_value = "cutouts")]
    pub out: PathBuf,

    /// Number of cutouts (default from config)
    #[arg(short, long)]
    pub num: Option<usize>,

    /// Side length of each cutout (default from config)
    #[arg(long)]
    pub cut_size: Option<usize>,

    /// Size-distribution exponent; above 1.0 favors small crops
    #[arg(long)]
    pub power: Option<f32>,

    /// Skip the augmentation pipeline
    #[arg(long)]
    pub no_augment: bool,

    /// Disable a single augmentation step by name (repeatable)
    #[arg(long = "disable", value_name = "STEP")]
    pub disabled_steps: Vec<String>,

    /// RNG seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,
}

impl CutoutsArgs {
    /// Merge CLI overrides onto the `[cutouts]` config section.
    pub fn resolve(&self, base: &CutoutConfig) -> CutoutConfig {
        CutoutConfig {
            cut_size: self.cut_size.unwrap_or(base.cut_size),
            num_cutouts: self.num.unwrap_or(base.num_cutouts),
            cutout_size_power: self.power.unwrap_or(base.cutout_size_power),
            augment: base.augment && !self.no_augment,
            seed: self.seed.or(base.seed),
        }
    }
}

/// Build a sampler, honoring `--disable` for individual steps.
pub fn build_sampler(
    settings: &CutoutConfig,
    disabled: &[String],
) -> anyhow::Result<MakeCutouts> {
    let mut sampler = MakeCutouts::from_config(settings)?;
    if let Some(pipeline) = sampler.augmentations_mut() {
        for step in disabled {
            if !pipeline.set_enabled(step, false) {
                anyhow::bail!(
                    "Unknown augmentation step {step:?} (available: {})",
                    pipeline.step_names().join(", ")
                );
            }
        }
    }
    Ok(sampler)
}

/// Execute the cutouts command.
pub fn execute(args: CutoutsArgs, config: &Config) -> anyhow::Result<()> {
    let settings = args.resolve(&config.cutouts);
    let sampler = build_sampler(&settings, &args.disabled_steps)?;

    let image = image_io::load_image(&args.image)?;
    let mut rng = make_rng(settings.seed);
    let batch = sampler.sample(&image, &mut rng)?;

    let prefix = args
        .image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cutout".to_string());
    let paths = image_io::save_batch(&batch, &args.out, &prefix)?;

    tracing::info!(
        count = paths.len(),
        cut_size = settings.cut_size,
        augmented = settings.augment,
        "Wrote cutouts"
    );
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}
