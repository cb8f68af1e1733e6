//! # Labelled Comment Datasets
//!
//! Loads binary-labelled comments from CSV/TSV or JSON Lines files and
//! produces seeded train/validation splits.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use oorandom::Rand32;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GlossaError, Result};

/// Default name of the text column.
pub const DEFAULT_TEXT_COLUMN: &str = "comment_text";
/// Default name of the label column.
pub const DEFAULT_LABEL_COLUMN: &str = "toxic";

/// A single comment with its binary label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    /// Target in `[0.0, 1.0]`; `1.0` is the positive class.
    pub label: f32,
}

impl Comment {
    pub fn new(text: impl Into<String>, label: f32) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.label >= 0.5
    }
}

/// On-disk layout of a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetFormat {
    /// Delimited text with a header row.
    Delimited(u8),
    /// One JSON object per line.
    JsonLines,
}

impl DatasetFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Delimited(b',')),
            "tsv" => Ok(Self::Delimited(b'\t')),
            "jsonl" | "ndjson" | "json" => Ok(Self::JsonLines),
            _ => Err(GlossaError::InvalidConfig(format!(
                "unsupported dataset extension {:?} for {}",
                ext,
                path.display()
            ))),
        }
    }
}

/// Names of the text and label fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetColumns {
    pub text: String,
    pub label: String,
}

impl Default for DatasetColumns {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEXT_COLUMN.to_string(),
            label: DEFAULT_LABEL_COLUMN.to_string(),
        }
    }
}

impl DatasetColumns {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// An ordered collection of labelled comments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    samples: Vec<Comment>,
}

impl Dataset {
    pub fn new(samples: Vec<Comment>) -> Self {
        Self { samples }
    }

    /// Load a dataset, picking the format from the file extension.
    pub fn load<P: AsRef<Path>>(path: P, columns: &DatasetColumns) -> Result<Self> {
        let path = path.as_ref();
        let format = DatasetFormat::from_path(path)?;
        Self::load_with_format(path, format, columns)
    }

    pub fn load_with_format<P: AsRef<Path>>(
        path: P,
        format: DatasetFormat,
        columns: &DatasetColumns,
    ) -> Result<Self> {
        let path = path.as_ref();
        let samples = match format {
            DatasetFormat::Delimited(delimiter) => read_delimited(path, delimiter, columns)?,
            DatasetFormat::JsonLines => read_json_lines(path, columns)?,
        };
        info!("Loaded {} samples from {}", samples.len(), path.display());
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Comment] {
        &self.samples
    }

    pub fn texts(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn labels(&self) -> Vec<f32> {
        self.samples.iter().map(|s| s.label).collect()
    }

    pub fn positives(&self) -> usize {
        self.samples.iter().filter(|s| s.is_positive()).count()
    }

    /// Shuffle with `seed` and split off `validation_fraction` of the samples.
    ///
    /// Both parts are non-empty whenever the dataset has two or more samples.
    pub fn split(&self, validation_fraction: f32, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
            return Err(GlossaError::InvalidConfig(format!(
                "validation fraction must be in (0, 1), got {validation_fraction}"
            )));
        }
        if self.samples.len() < 2 {
            return Err(GlossaError::InvalidConfig(format!(
                "need at least 2 samples to split, got {}",
                self.samples.len()
            )));
        }

        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        shuffle(&mut order, seed);

        let n = self.samples.len();
        let n_val = ((n as f32 * validation_fraction).round() as usize).clamp(1, n - 1);
        let (val_idx, train_idx) = order.split_at(n_val);

        let pick = |idx: &[usize]| Dataset {
            samples: idx.iter().map(|&i| self.samples[i].clone()).collect(),
        };
        Ok((pick(train_idx), pick(val_idx)))
    }
}

/// Seeded Fisher-Yates shuffle.
pub fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut rng = Rand32::new(seed);
    shuffle_with(items, &mut rng);
}

/// Fisher-Yates shuffle drawing from an existing generator.
pub fn shuffle_with<T>(items: &mut [T], rng: &mut Rand32) {
    for i in (1..items.len()).rev() {
        let j = rng.rand_range(0..(i as u32 + 1)) as usize;
        items.swap(i, j);
    }
}

/// Interpret a raw label: booleans or numbers in `[0, 1]`.
pub fn parse_label(raw: &str, line: usize) -> Result<f32> {
    let trimmed = raw.trim();
    let value = match trimmed.to_ascii_lowercase().as_str() {
        "true" | "yes" => 1.0,
        "false" | "no" => 0.0,
        other => other.parse::<f32>().map_err(|_| GlossaError::InvalidLabel {
            line,
            value: raw.to_string(),
        })?,
    };
    if !(0.0..=1.0).contains(&value) {
        return Err(GlossaError::InvalidLabel {
            line,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

fn read_delimited(path: &Path, delimiter: u8, columns: &DatasetColumns) -> Result<Vec<Comment>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| GlossaError::MissingColumn(name.to_string()))
    };
    let text_col = position(&columns.text)?;
    let label_col = position(&columns.label)?;

    let mut samples = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 1;
        let text = record
            .get(text_col)
            .ok_or_else(|| GlossaError::MissingColumn(columns.text.clone()))?;
        let label = record
            .get(label_col)
            .ok_or_else(|| GlossaError::MissingColumn(columns.label.clone()))?;
        samples.push(Comment::new(text, parse_label(label, line)?));
    }
    Ok(samples)
}

fn read_json_lines(path: &Path, columns: &DatasetColumns) -> Result<Vec<Comment>> {
    let reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: serde_json::Value = serde_json::from_str(&line)?;
        let text = record
            .get(&columns.text)
            .and_then(|v| v.as_str())
            .ok_or_else(|| GlossaError::MissingColumn(columns.text.clone()))?;
        let label = match record.get(&columns.label) {
            Some(serde_json::Value::Bool(b)) => f32::from(u8::from(*b)),
            Some(serde_json::Value::Number(n)) => parse_label(&n.to_string(), i + 1)?,
            Some(serde_json::Value::String(s)) => parse_label(s, i + 1)?,
            Some(other) => {
                return Err(GlossaError::InvalidLabel {
                    line: i + 1,
                    value: other.to_string(),
                });
            }
            None => return Err(GlossaError::MissingColumn(columns.label.clone())),
        };
        samples.push(Comment::new(text, label));
    }
    Ok(samples)
}
