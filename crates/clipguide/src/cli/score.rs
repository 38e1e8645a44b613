//! The `clipguide score` command: score image cutouts against prompts.

use std::path::PathBuf;

use clap::Args;
use clipguide_core::{score_cutouts, Config, CutoutScores, MakeCutouts};

use super::{image_io, make_rng};

/// Arguments for the `score` command.
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Candidate image
    pub image: PathBuf,

    /// One or more text prompts
    #[arg(required = true, num_args = 1..)]
    pub prompts: Vec<String>,

    /// Number of cutouts (default from config)
    #[arg(short, long)]
    pub num: Option<usize>,

    /// Skip the augmentation pipeline
    #[arg(long)]
    pub no_augment: bool,

    /// RNG seed for reproducible scores
    #[arg(long)]
    pub seed: Option<u64>,

    /// Model identifier (default from config)
    #[arg(long)]
    pub model: Option<String>,

    /// Device designator (default from config)
    #[arg(long)]
    pub device: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the score command.
pub fn execute(args: ScoreArgs, config: &Config) -> anyhow::Result<()> {
    let (model, resolution) =
        super::load_model(config, args.model.as_deref(), args.device.as_deref())?;

    // Cutouts always match the model resolution here, whatever `cut_size` says.
    let sampler = MakeCutouts::new(
        resolution as usize,
        args.num.unwrap_or(config.cutouts.num_cutouts),
        config.cutouts.cutout_size_power,
        config.cutouts.augment && !args.no_augment,
    )?;

    let image = image_io::load_image(&args.image)?;
    let mut rng = make_rng(args.seed.or(config.cutouts.seed));
    let cutouts = sampler.sample(&image, &mut rng)?;

    let prompts = model.encode_text(&args.prompts)?;
    let scores = score_cutouts(model.as_ref(), &cutouts, &prompts)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&scores)?);
    } else {
        print!("{}", format_scores(&args.prompts, &scores));
    }
    Ok(())
}

/// Human-readable score listing.
pub fn format_scores(prompts: &[String], scores: &CutoutScores) -> String {
    let mut out = format!("{} cutouts\n", scores.num_cutouts);
    for ((prompt, sim), dist) in prompts
        .iter()
        .zip(&scores.similarity)
        .zip(&scores.spherical_distance)
    {
        out.push_str(&format!(
            "  similarity {sim:>7.4}  distance {dist:>7.4}  {prompt}\n"
        ));
    }
    out.push_str(&format!("  total loss {:.4}\n", scores.total_loss()));
    out
}
