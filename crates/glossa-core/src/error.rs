use thiserror::Error;

/// Errors that can occur during Glossa core operations.
#[derive(Debug, Error)]
pub enum GlossaError {
    /// The input string or collection is empty.
    #[error("input is empty or whitespace-only")]
    EmptyInput,

    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV dataset could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Candle tensor framework error.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// A filter pattern failed to compile.
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    /// A line of the embedding text file could not be parsed.
    #[error("malformed embedding at line {line}: {reason}")]
    MalformedEmbedding {
        /// 1-based line number in the embedding file.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Vector or matrix width does not match the configured dimension.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Dimension actually observed.
        found: usize,
    },

    /// A dataset label could not be interpreted as 0 or 1.
    #[error("invalid label {value:?} for record {line}")]
    InvalidLabel {
        /// 1-based record number.
        line: usize,
        /// The raw label text.
        value: String,
    },

    /// A required dataset column or field is absent.
    #[error("missing column {0:?}")]
    MissingColumn(String),

    /// The GPU list could not be parsed.
    #[error("invalid device specification: {0:?}")]
    InvalidDevice(String),

    /// A model or tokenizer was used before fitting or loading.
    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for Glossa operations.
pub type Result<T> = std::result::Result<T, GlossaError>;
