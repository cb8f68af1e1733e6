//! Training configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use glossa_core::{DatasetColumns, TokenizerConfig};
use serde::{Deserialize, Serialize};

use crate::model::NetConfig;

/// Directory that receives one sub-directory per trained model.
pub const MODELS_PATH: &str = "models";

/// Default pretrained embedding file.
pub const GLOVE_PATH: &str = "data/glove.840B.300d.txt";

/// Default stop-word list.
pub const STOPWORDS_PATH: &str = "data/stopwords.txt";

/// File name of the serialized configuration inside a model directory.
pub const CONFIG_FILE: &str = "config.json";

/// Where parsed embedding tables are cached.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glossa")
        .join("embeddings")
}

/// All hyperparameters and paths of a training run.
///
/// Saved next to the weights so a model directory can be reloaded on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub dataset_path: PathBuf,
    pub columns: DatasetColumns,
    pub glove_path: Option<PathBuf>,
    pub stopwords_path: Option<PathBuf>,
    pub cache_path: PathBuf,
    pub models_path: PathBuf,
    pub embedding_dim: usize,
    /// Vocabulary size, padding index included.
    pub num_words: usize,
    pub sequence_length: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_fraction: f32,
    /// Recurrent units per direction.
    pub units: usize,
    pub spatial_dropout: f32,
    pub early_stopping_patience: usize,
    pub reduce_lr_patience: usize,
    pub reduce_lr_factor: f64,
    pub min_learning_rate: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/train.csv"),
            columns: DatasetColumns::default(),
            glove_path: Some(PathBuf::from(GLOVE_PATH)),
            stopwords_path: Some(PathBuf::from(STOPWORDS_PATH)),
            cache_path: default_cache_dir(),
            models_path: PathBuf::from(MODELS_PATH),
            embedding_dim: 300,
            num_words: 50_000,
            sequence_length: 200,
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
            validation_fraction: 0.1,
            units: 128,
            spatial_dropout: 0.2,
            early_stopping_patience: 5,
            reduce_lr_patience: 3,
            reduce_lr_factor: 0.2,
            min_learning_rate: 1e-6,
            seed: 42,
        }
    }
}

impl TrainConfig {
    /// Reject values the training loop cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.embedding_dim == 0 {
            bail!("embedding_dim must be positive");
        }
        if self.num_words < 2 {
            bail!("num_words must be at least 2 (index 0 is padding)");
        }
        if self.sequence_length == 0 {
            bail!("sequence_length must be positive");
        }
        if self.epochs == 0 {
            bail!("epochs must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.units == 0 {
            bail!("units must be positive");
        }
        if !(self.learning_rate > 0.0) {
            bail!("learning_rate must be positive");
        }
        if !(0.0..1.0).contains(&self.spatial_dropout) {
            bail!("spatial_dropout must be in [0, 1)");
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            bail!("validation_fraction must be in (0, 1)");
        }
        if !(self.reduce_lr_factor > 0.0 && self.reduce_lr_factor < 1.0) {
            bail!("reduce_lr_factor must be in (0, 1)");
        }
        Ok(())
    }

    /// Tokenizer settings implied by this configuration.
    pub fn tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig::default().with_num_words(self.num_words)
    }

    /// Network shape implied by this configuration.
    pub fn net_config(&self) -> NetConfig {
        NetConfig {
            num_words: self.num_words,
            embedding_dim: self.embedding_dim,
            units: self.units,
            spatial_dropout: self.spatial_dropout,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading {}", path.as_ref().display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        TrainConfig::default().validate().unwrap();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = TrainConfig {
            batch_size: 0,
            ..TrainConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TrainConfig {
            validation_fraction: 1.0,
            ..TrainConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TrainConfig {
            num_words: 1,
            ..TrainConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TrainConfig {
            epochs: 0,
            ..TrainConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("epochs"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainConfig = serde_json::from_str(r#"{"epochs": 3, "units": 16}"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.units, 16);
        assert_eq!(config.sequence_length, 200);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = TrainConfig {
            glove_path: None,
            seed: 7,
            ..TrainConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(TrainConfig::load(&path).unwrap(), config);
    }
}
