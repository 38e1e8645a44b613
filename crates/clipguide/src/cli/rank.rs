//! The `clipguide rank` command: rank vocabulary labels against a prompt.

use std::path::PathBuf;

use clap::Args;
use clipguide_core::ranking::RankedLabel;
use clipguide_core::{Config, SemanticRanker, Vocabulary};

/// Arguments for the `rank` command.
#[derive(Args, Debug)]
pub struct RankArgs {
    /// Text whose embedding is used as the query
    pub prompt: String,

    /// Label file: one label per line, or the `N: 'label',` dict layout
    #[arg(short, long)]
    pub labels: PathBuf,

    /// Number of labels to print (default from config, else all)
    #[arg(short, long)]
    pub top: Option<usize>,

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

/// Execute the rank command.
pub fn execute(args: RankArgs, config: &Config) -> anyhow::Result<()> {
    let vocabulary = Vocabulary::load(&args.labels)?;
    let top = args.top.or(config.ranking.top_n);

    let (model, _) = super::load_model(config, args.model.as_deref(), args.device.as_deref())?;
    let ranker = SemanticRanker::from_config(&config.ranking);

    let query = model.encode_text(std::slice::from_ref(&args.prompt))?;
    let labels = ranker.encode_labels(model.as_ref(), vocabulary.labels())?;
    let ranked = ranker.ranked_labels(&query, &labels, top)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
    } else {
        print!("{}", format_table(&ranked));
    }
    Ok(())
}

/// Human-readable listing, one label per line.
pub fn format_table(ranked: &[RankedLabel]) -> String {
    ranked
        .iter()
        .enumerate()
        .map(|(rank, r)| {
            format!(
                "{:>3}. {:>6.2}%  [{}] {}\n",
                rank + 1,
                r.probability * 100.0,
                r.index,
                r.label
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_labels_in_rank_order() {
        let ranked = vec![
            RankedLabel {
                index: 281,
                label: "tabby cat".to_string(),
                probability: 0.875,
            },
            RankedLabel {
                index: 285,
                label: "Egyptian cat".to_string(),
                probability: 0.1,
            },
        ];
        let table = format_table(&ranked);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "  1.  87.50%  [281] tabby cat");
        assert!(lines[1].ends_with("[285] Egyptian cat"));
    }

    #[test]
    fn ranked_labels_serialize_to_json() {
        let ranked = vec![RankedLabel {
            index: 0,
            label: "cat".to_string(),
            probability: 0.5,
        }];
        let json: serde_json::Value = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json[0]["label"], "cat");
        assert_eq!(json[0]["index"], 0);
    }
}
