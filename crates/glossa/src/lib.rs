//! # Glossa
//!
//! Binary comment classification: GloVe-initialised word embeddings feeding a
//! bidirectional GRU/LSTM network.
//!
//! This crate re-exports [`glossa_core`] (text preprocessing, vocabularies,
//! embeddings, datasets) and [`glossa_trainer`] (network, training loop and
//! model persistence).
//!
//! ```no_run
//! use glossa::{Dataset, DatasetColumns, StopWords, TextClassifier, TrainConfig};
//! use glossa::candle_core::Device;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TrainConfig::default();
//! let dataset = Dataset::load(&config.dataset_path, &DatasetColumns::default())?;
//! let (train, validation) = dataset.split(config.validation_fraction, config.seed)?;
//!
//! let mut classifier = TextClassifier::new(config.clone(), Device::Cpu);
//! classifier.fit(&train, &validation, StopWords::new())?;
//! classifier.save(&config.models_path)?;
//! # Ok(())
//! # }
//! ```

pub use glossa_core;
pub use glossa_trainer;

pub use glossa_core::{
    Comment, Dataset, DatasetColumns, DatasetFormat, DatasetStats, EmbeddingCoverage,
    EmbeddingMatrix, GloveTable, GlossaError, PaddedSequences, Padding, StopWords,
    TokenizerConfig, Truncating, WordTokenizer, pad_sequences, select_device,
};
pub use glossa_trainer::{
    CommentNet, EarlyStopping, History, NetConfig, ReduceLrOnPlateau, TextClassifier,
    TrainConfig, init_logging, run_training,
};

/// Tensor and device types used in the public API.
pub mod candle_core {
    pub use candle_core::{DType, Device, Tensor};
}
