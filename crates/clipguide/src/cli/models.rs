//! The `clipguide models` command for inspecting model installations.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use clipguide_core::model::OnnxClip;
use clipguide_core::{Config, ModelName};

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// List supported models and whether their files are installed
    List,

    /// Show model directory path
    Path,
}

/// Install status of one supported model.
pub struct ModelStatus {
    pub name: ModelName,
    pub dir: PathBuf,
    /// Required files that are not on disk.
    pub missing: Vec<PathBuf>,
}

impl ModelStatus {
    pub fn is_installed(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check every supported model under `model_dir`.
pub fn check_installed(model_dir: &Path) -> Vec<ModelStatus> {
    ModelName::ALL
        .iter()
        .map(|&name| ModelStatus {
            name,
            dir: model_dir.join(name.slug()),
            missing: OnnxClip::required_files(model_dir, name)
                .into_iter()
                .filter(|p| !p.exists())
                .collect(),
        })
        .collect()
}

/// Execute the models command.
pub fn execute(args: ModelsArgs, config: &Config) -> anyhow::Result<()> {
    let model_dir = config.model_dir();

    match args.command {
        ModelsCommand::List => {
            println!("Models directory: {}\n", model_dir.display());

            for status in check_installed(&model_dir) {
                let state = if status.is_installed() {
                    "ready"
                } else {
                    "not installed"
                };
                let default_marker = if status.name.as_str() == config.model.name {
                    "  (default)"
                } else {
                    ""
                };
                println!(
                    "  {:<10} {:>4}px  {:<14}{}",
                    status.name.as_str(),
                    status.name.input_resolution(),
                    state,
                    default_marker
                );
                for path in &status.missing {
                    tracing::debug!(
                        model = %status.name,
                        path = %path.display(),
                        "Missing model file"
                    );
                }
            }

            println!(
                "\nExport models to ONNX as <dir>/<model>/visual.onnx, text.onnx and tokenizer.json."
            );
        }

        ModelsCommand::Path => {
            println!("{}", model_dir.display());
        }
    }

    Ok(())
}
