//! End-to-end training run.

use std::path::PathBuf;

use anyhow::{Context, bail};
use glossa_core::{Dataset, StopWords, device_from_env};
use tracing::{info, warn};

use crate::classifier::TextClassifier;
use crate::config::TrainConfig;

/// Read the configured stop-word list, or an empty one when it is missing.
pub fn load_stop_words(config: &TrainConfig) -> anyhow::Result<StopWords> {
    match &config.stopwords_path {
        Some(path) if path.exists() => {
            let words = StopWords::load(path)
                .with_context(|| format!("reading stop words from {}", path.display()))?;
            info!("Loaded {} stop words", words.len());
            Ok(words)
        }
        Some(path) => {
            warn!("Stop-word list not found at {}, keeping every word", path.display());
            Ok(StopWords::new())
        }
        None => Ok(StopWords::new()),
    }
}

/// Load the dataset, train a classifier and save it under
/// `config.models_path`. Returns the model directory.
pub fn run_training(config: &TrainConfig) -> anyhow::Result<PathBuf> {
    config.validate()?;

    if !config.dataset_path.exists() {
        bail!("Training data not found: {}", config.dataset_path.display());
    }
    if let Some(glove) = config.glove_path.as_ref().filter(|p| !p.exists()) {
        bail!("Embedding file not found: {}", glove.display());
    }

    info!("Loading dataset from {}", config.dataset_path.display());
    let dataset = Dataset::load(&config.dataset_path, &config.columns)?;
    let (train, validation) = dataset.split(config.validation_fraction, config.seed)?;
    info!(
        "{} training and {} validation comments ({} positive)",
        train.len(),
        validation.len(),
        dataset.positives()
    );

    let stop_words = load_stop_words(config)?;
    let device = device_from_env()?;

    let mut classifier = TextClassifier::new(config.clone(), device);
    classifier.fit(&train, &validation, stop_words)?;

    match classifier.save(&config.models_path)? {
        Some(dir) => Ok(dir),
        None => bail!("training produced no epochs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_stop_words_are_empty() {
        let config = TrainConfig {
            stopwords_path: Some(PathBuf::from("/nonexistent/stopwords.txt")),
            ..TrainConfig::default()
        };
        assert!(load_stop_words(&config).unwrap().is_empty());
    }

    #[test]
    fn test_stop_words_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stopwords.txt");
        fs::write(&path, "# common\nthe\nA\n\n").unwrap();
        let config = TrainConfig {
            stopwords_path: Some(path),
            ..TrainConfig::default()
        };
        let words = load_stop_words(&config).unwrap();
        assert_eq!(words.len(), 2);
        assert!(words.contains("a"));
    }

    #[test]
    fn test_missing_dataset_fails() {
        let config = TrainConfig {
            dataset_path: PathBuf::from("/nonexistent/train.csv"),
            glove_path: None,
            ..TrainConfig::default()
        };
        let err = run_training(&config).unwrap_err();
        assert!(err.to_string().contains("Training data not found"));
    }
}
