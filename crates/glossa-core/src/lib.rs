//! # Glossa Core
//!
//! Text preprocessing for the Glossa comment classifier: word tokenization
//! with stop-word removal, frequency-ranked vocabularies, sequence padding,
//! GloVe embedding tables and labelled datasets.
//!
//! ## Quick Start
//!
//! ```rust
//! use glossa_core::{pad_sequences, Padding, Truncating, TokenizerConfig, WordTokenizer};
//!
//! let mut tokenizer = WordTokenizer::new(TokenizerConfig::default().with_num_words(100)).unwrap();
//! tokenizer.fit_on_texts(["thanks for the edit", "please stop vandalising the page"]);
//!
//! let sequences = tokenizer.texts_to_sequences(["thanks for the page"]);
//! let padded = pad_sequences(&sequences, 6, Padding::Pre, Truncating::Pre, 0).unwrap();
//! assert_eq!(padded.row(0).unwrap().len(), 6);
//! ```
pub mod dataset;
pub mod device;
pub mod embeddings;
pub mod error;
pub mod sequence;
pub mod stats;
pub mod text;
pub mod tokenizer;

// Re-export primary API
pub use dataset::{Comment, Dataset, DatasetColumns, DatasetFormat};
pub use device::{device_from_env, parse_gpu_list, select_device};
pub use embeddings::{EmbeddingCoverage, EmbeddingMatrix, GloveTable};
pub use error::{GlossaError, Result};
pub use sequence::{PaddedSequences, Padding, Truncating, pad_sequences};
pub use stats::{CutoffStats, DatasetStats, LengthStats};
pub use text::{StopWords, TextFilter, text_to_word_sequence};
pub use tokenizer::{TokenizerConfig, WordTokenizer};
