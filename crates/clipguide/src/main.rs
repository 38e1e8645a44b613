//! clipguide CLI - cutout sampling, prompt scoring and label ranking for
//! CLIP-guided image generation.
//!
//! # Usage
//!
//! ```bash
//! # Sample augmented cutouts and write them as PNGs
//! clipguide cutouts image.png --out ./cutouts --num 16 --seed 7
//!
//! # Score an image against prompts
//! clipguide score image.png "a watercolor fox" "a photo of a dog"
//!
//! # Rank ImageNet classes against a prompt
//! clipguide rank "a small striped cat" --labels imagenet_classes.txt --top 5
//!
//! # View configuration
//! clipguide config show
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// clipguide - CLIP scoring tools for guided image generation.
#[derive(Parser, Debug)]
#[command(name = "clipguide")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "CLIPGUIDE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample random cutouts of an image and save them as PNGs
    Cutouts(cli::cutouts::CutoutsArgs),

    /// Rank vocabulary labels against a text prompt
    Rank(cli::rank::RankArgs),

    /// Score image cutouts against one or more prompts
    Score(cli::score::ScoreArgs),

    /// Inspect supported and installed models
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

/// Load the config from `--config` (parse errors are fatal) or the default
/// location (errors fall back to defaults).
fn load_config(path: Option<&Path>) -> anyhow::Result<clipguide_core::Config> {
    if let Some(path) = path {
        if path.exists() {
            return Ok(clipguide_core::Config::load_from(path)?);
        }
        // Missing is fine for `config init --config PATH`.
        eprintln!(
            "Warning: Config file {} does not exist, using defaults.",
            path.display()
        );
        return Ok(clipguide_core::Config::default());
    }
    // Logging isn't initialized yet, so use eprintln for config warnings.
    Ok(match clipguide_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `clipguide config path`."
            );
            clipguide_core::Config::default()
        }
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("clipguide v{}", clipguide_core::VERSION);

    match cli.command {
        Commands::Cutouts(args) => cli::cutouts::execute(args, &config),
        Commands::Rank(args) => cli::rank::execute(args, &config),
        Commands::Score(args) => cli::score::execute(args, &config),
        Commands::Models(args) => cli::models::execute(args, &config),
        Commands::Config(args) => cli::config::execute(args, &config, cli.config.as_deref()),
    }
}
