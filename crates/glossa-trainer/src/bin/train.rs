use std::path::PathBuf;

use clap::Parser;
use glossa_core::DatasetColumns;
use glossa_trainer::config::{GLOVE_PATH, MODELS_PATH, STOPWORDS_PATH, default_cache_dir};
use glossa_trainer::{TrainConfig, init_logging, run_training};
use tracing::error;

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train the recurrent comment classifier")]
#[command(version)]
struct Cli {
    /// Labelled dataset (CSV, TSV or JSON Lines)
    #[arg(short, long, env = "GLOSSA_DATASET", default_value = "data/train.csv")]
    dataset: PathBuf,

    /// Column holding the comment text
    #[arg(long, env = "GLOSSA_TEXT_COLUMN", default_value = glossa_core::dataset::DEFAULT_TEXT_COLUMN)]
    text_column: String,

    /// Column holding the 0/1 label
    #[arg(long, env = "GLOSSA_LABEL_COLUMN", default_value = glossa_core::dataset::DEFAULT_LABEL_COLUMN)]
    label_column: String,

    /// Pretrained GloVe text file
    #[arg(short, long, env = "GLOSSA_GLOVE", default_value = GLOVE_PATH)]
    glove: PathBuf,

    /// Train with a random frozen embedding instead of GloVe
    #[arg(long)]
    no_glove: bool,

    /// Stop-word list, one word per line
    #[arg(long, env = "GLOSSA_STOPWORDS", default_value = STOPWORDS_PATH)]
    stopwords: PathBuf,

    /// Directory for parsed embedding caches
    #[arg(long, env = "GLOSSA_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Output directory for trained models
    #[arg(short, long, env = "GLOSSA_MODELS_DIR", default_value = MODELS_PATH)]
    models: PathBuf,

    #[arg(long, default_value_t = 300)]
    embedding_dim: usize,

    /// Vocabulary size, padding index included
    #[arg(long, default_value_t = 50_000)]
    num_words: usize,

    #[arg(long, default_value_t = 200)]
    sequence_length: usize,

    #[arg(short, long, env = "GLOSSA_EPOCHS", default_value_t = 10)]
    epochs: usize,

    #[arg(short, long, env = "GLOSSA_BATCH_SIZE", default_value_t = 32)]
    batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    learning_rate: f64,

    #[arg(long, default_value_t = 0.1)]
    validation_fraction: f32,

    /// Recurrent units per direction
    #[arg(long, default_value_t = 128)]
    units: usize,

    #[arg(long, default_value_t = 0.2)]
    spatial_dropout: f32,

    #[arg(long, env = "GLOSSA_SEED", default_value_t = 42)]
    seed: u64,

    /// JSON configuration file; replaces every other option
    #[arg(short, long, env = "GLOSSA_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<TrainConfig> {
        if let Some(path) = self.config {
            return TrainConfig::load(path);
        }
        Ok(TrainConfig {
            dataset_path: self.dataset,
            columns: DatasetColumns::new(self.text_column, self.label_column),
            glove_path: (!self.no_glove).then_some(self.glove),
            stopwords_path: Some(self.stopwords),
            cache_path: self.cache_dir.unwrap_or_else(default_cache_dir),
            models_path: self.models,
            embedding_dim: self.embedding_dim,
            num_words: self.num_words,
            sequence_length: self.sequence_length,
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            validation_fraction: self.validation_fraction,
            units: self.units,
            spatial_dropout: self.spatial_dropout,
            seed: self.seed,
            ..TrainConfig::default()
        })
    }
}

fn main() {
    init_logging();

    let result = Cli::parse()
        .into_config()
        .and_then(|config| run_training(&config));
    match result {
        Ok(dir) => println!("{}", dir.display()),
        Err(e) => {
            error!("Training failed: {:#}", e);
            eprintln!("Training failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
