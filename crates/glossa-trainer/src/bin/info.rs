use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use glossa_core::{Dataset, DatasetColumns, DatasetStats, GloveTable, TokenizerConfig};
use glossa_trainer::config::{STOPWORDS_PATH, default_cache_dir};
use glossa_trainer::{TrainConfig, init_logging, load_stop_words};

#[derive(Parser)]
#[command(name = "info")]
#[command(about = "Print statistics about a labelled comment dataset")]
#[command(version)]
struct Cli {
    /// Labelled dataset (CSV, TSV or JSON Lines)
    #[arg(env = "GLOSSA_DATASET", default_value = "data/train.csv")]
    dataset: PathBuf,

    #[arg(long, env = "GLOSSA_TEXT_COLUMN", default_value = glossa_core::dataset::DEFAULT_TEXT_COLUMN)]
    text_column: String,

    #[arg(long, env = "GLOSSA_LABEL_COLUMN", default_value = glossa_core::dataset::DEFAULT_LABEL_COLUMN)]
    label_column: String,

    #[arg(long, env = "GLOSSA_STOPWORDS", default_value = STOPWORDS_PATH)]
    stopwords: PathBuf,

    /// Report how much of the vocabulary this GloVe file covers
    #[arg(short, long, env = "GLOSSA_GLOVE")]
    glove: Option<PathBuf>,

    #[arg(long, default_value_t = 300)]
    embedding_dim: usize,

    #[arg(long, env = "GLOSSA_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Vocabulary cut-off to report token coverage for
    #[arg(long, default_value_t = 50_000)]
    num_words: usize,

    #[arg(long, default_value_t = 200)]
    sequence_length: usize,

    /// Number of most frequent words to list
    #[arg(long, default_value_t = 20)]
    top: usize,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let columns = DatasetColumns::new(cli.text_column, cli.label_column);
    let dataset = Dataset::load(&cli.dataset, &columns)
        .with_context(|| format!("loading {}", cli.dataset.display()))?;

    let stop_words = load_stop_words(&TrainConfig {
        stopwords_path: Some(cli.stopwords),
        ..TrainConfig::default()
    })?;

    let table = match &cli.glove {
        Some(path) => Some(GloveTable::load_cached(
            path,
            cli.embedding_dim,
            cli.cache_dir.unwrap_or_else(default_cache_dir),
        )?),
        None => None,
    };

    let stats = DatasetStats::compute(
        &dataset,
        TokenizerConfig::default().with_num_words(cli.num_words),
        stop_words,
        cli.sequence_length,
        cli.top,
        table.as_ref(),
    )?;
    println!("Dataset:          {}", cli.dataset.display());
    println!("{stats}");
    Ok(())
}

fn main() {
    init_logging();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
