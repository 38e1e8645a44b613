//! Label vocabulary loading.
//!
//! Accepts either one label per line or the Python-dict layout the ImageNet
//! class list is commonly shipped in:
//!
//! ```text
//! {0: 'tench, Tinca tinca',
//!  1: 'goldfish, Carassius auratus',
//! ```

use std::path::Path;

use crate::error::{GuideError, RankingError};

/// An ordered list of class labels. Ranking results index into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    labels: Vec<String>,
}

impl Vocabulary {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Load a label file from disk.
    ///
    /// Fails if the file cannot be read or contains no labels.
    pub fn load(path: &Path) -> Result<Self, GuideError> {
        let content = std::fs::read_to_string(path)?;
        let vocabulary = Self::parse(&content);
        if vocabulary.is_empty() {
            return Err(RankingError::EmptyVocabulary.into());
        }
        tracing::debug!(path = ?path, labels = vocabulary.len(), "Loaded vocabulary");
        Ok(vocabulary)
    }

    /// Parse label file content. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Self {
        let labels = content.lines().filter_map(parse_line).collect();
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.trim_start_matches('{').trim_end_matches('}').trim();
    let line = line.strip_suffix(',').unwrap_or(line).trim();
    if line.is_empty() {
        return None;
    }

    // `N: 'label'` / `N: "label"`
    if let Some((key, value)) = line.split_once(':') {
        if !key.trim().is_empty() && key.trim().chars().all(|c| c.is_ascii_digit()) {
            return unquote(value.trim()).map(str::to_string);
        }
    }

    Some(unquote(line).unwrap_or(line).to_string())
}

fn unquote(s: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        s.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}
