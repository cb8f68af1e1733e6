//! # Glossa Trainer
//!
//! Training and inference for the recurrent comment classifier: the
//! network, epoch callbacks, training history and the `train`, `info` and
//! `predict` binaries.

pub mod callbacks;
pub mod classifier;
pub mod config;
pub mod history;
pub mod model;
pub mod trainer;

pub use callbacks::{Action, Callback, EarlyStopping, ReduceLrOnPlateau};
pub use classifier::{Evaluation, TextClassifier};
pub use config::TrainConfig;
pub use history::{EpochLogs, History};
pub use model::{CommentNet, NetConfig};
pub use trainer::{load_stop_words, run_training};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber on stderr, honouring `RUST_LOG` and
/// defaulting to `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
