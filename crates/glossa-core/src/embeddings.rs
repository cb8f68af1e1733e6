//! # Pretrained Word Embeddings
//!
//! Loads GloVe tables from their text distribution, caches the parsed table
//! next to other derived artifacts, and builds the frozen embedding matrix
//! used as the first layer of the classifier.
//!
//! The text format is one entry per line: the word followed by `dim`
//! space-separated floats. Some distributions (e.g. `glove.840B.300d`)
//! contain words with embedded spaces, so the vector is always taken from
//! the *last* `dim` fields and everything before them is the word.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use oorandom::Rand32;
use tracing::{debug, info, warn};

use crate::error::{GlossaError, Result};
use crate::tokenizer::WordTokenizer;

const CACHE_TENSOR: &str = "vectors";
const MATRIX_TENSOR: &str = "embedding";

/// Standard deviation of vectors drawn for words missing from the table.
pub const UNKNOWN_WORD_STDDEV: f32 = 0.5;

/// Bound of the uniform initializer used without a pretrained table.
pub const UNIFORM_INIT_LIMIT: f32 = 0.05;

/// In-memory word -> vector table.
#[derive(Debug, Clone)]
pub struct GloveTable {
    dim: usize,
    words: Vec<String>,
    index: HashMap<String, usize>,
    vectors: Vec<f32>,
}

impl GloveTable {
    fn with_dim(dim: usize) -> Self {
        Self {
            dim,
            words: Vec::new(),
            index: HashMap::new(),
            vectors: Vec::new(),
        }
    }

    /// Insert or replace the vector of `word`.
    pub fn insert(&mut self, word: String, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(GlossaError::DimensionMismatch {
                expected: self.dim,
                found: vector.len(),
            });
        }
        match self.index.get(&word) {
            Some(&row) => {
                self.vectors[row * self.dim..(row + 1) * self.dim].copy_from_slice(vector);
            }
            None => {
                self.index.insert(word.clone(), self.words.len());
                self.words.push(word);
                self.vectors.extend_from_slice(vector);
            }
        }
        Ok(())
    }

    /// Parse a GloVe text file with vectors of width `dim`.
    pub fn from_text<P: AsRef<Path>>(path: P, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(GlossaError::InvalidConfig(
                "embedding dimension must be positive".into(),
            ));
        }
        let path = path.as_ref();
        info!("Parsing embedding table {}", path.display());

        let reader = BufReader::new(File::open(path)?);
        let mut table = Self::with_dim(dim);
        let mut vector = Vec::with_capacity(dim);

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            // fields are separated by single ASCII spaces; the word keeps its exact bytes
            let line = line.trim_end_matches(|c: char| c.is_ascii_whitespace());
            if line.is_empty() {
                continue;
            }
            let mut fields: Vec<&str> = line.rsplitn(dim + 1, ' ').collect();
            if fields.len() <= dim {
                return Err(GlossaError::MalformedEmbedding {
                    line: line_no + 1,
                    reason: format!("expected a word and {} values, found {} fields", dim, fields.len()),
                });
            }
            fields.reverse();

            vector.clear();
            for value in &fields[1..] {
                let v = value.parse::<f32>().map_err(|e| GlossaError::MalformedEmbedding {
                    line: line_no + 1,
                    reason: format!("{value:?}: {e}"),
                })?;
                vector.push(v);
            }
            table.insert(fields[0].to_string(), &vector)?;
        }

        if table.is_empty() {
            return Err(GlossaError::EmptyInput);
        }
        info!("Parsed {} vectors of dimension {}", table.len(), dim);
        Ok(table)
    }

    /// Load the table from `cache_dir` if a matching cache exists, otherwise
    /// parse `path` and write the cache.
    pub fn load_cached<P: AsRef<Path>, C: AsRef<Path>>(
        path: P,
        dim: usize,
        cache_dir: C,
    ) -> Result<Self> {
        let (vectors_path, words_path) = cache_paths(path.as_ref(), cache_dir.as_ref());

        if vectors_path.exists() && words_path.exists() {
            match Self::read_cache(&vectors_path, &words_path, dim) {
                Ok(table) => {
                    info!(
                        "Loaded {} cached vectors from {}",
                        table.len(),
                        vectors_path.display()
                    );
                    return Ok(table);
                }
                Err(e) => warn!("Ignoring embedding cache {}: {}", vectors_path.display(), e),
            }
        }

        let table = Self::from_text(path, dim)?;
        if let Some(parent) = vectors_path.parent() {
            fs::create_dir_all(parent)?;
        }
        table.write_cache(&vectors_path, &words_path)?;
        Ok(table)
    }

    /// Write the cache files for this table.
    pub fn write_cache(&self, vectors_path: &Path, words_path: &Path) -> Result<()> {
        let tensor = Tensor::from_slice(&self.vectors, (self.len(), self.dim), &Device::Cpu)?;
        tensor.save_safetensors(CACHE_TENSOR, vectors_path)?;
        fs::write(words_path, serde_json::to_string(&self.words)?)?;
        debug!("Embedding cache written to {}", vectors_path.display());
        Ok(())
    }

    fn read_cache(vectors_path: &Path, words_path: &Path, dim: usize) -> Result<Self> {
        let words: Vec<String> = serde_json::from_str(&fs::read_to_string(words_path)?)?;
        let tensors = candle_core::safetensors::load(vectors_path, &Device::Cpu)?;
        let tensor = tensors
            .get(CACHE_TENSOR)
            .ok_or_else(|| GlossaError::MissingColumn(CACHE_TENSOR.to_string()))?;

        let (rows, cols) = tensor.dims2()?;
        if cols != dim {
            return Err(GlossaError::DimensionMismatch {
                expected: dim,
                found: cols,
            });
        }
        if rows != words.len() {
            return Err(GlossaError::DimensionMismatch {
                expected: words.len(),
                found: rows,
            });
        }

        let vectors = tensor.flatten_all()?.to_vec1::<f32>()?;
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Ok(Self {
            dim,
            words,
            index,
            vectors,
        })
    }

    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.index
            .get(word)
            .map(|&row| &self.vectors[row * self.dim..(row + 1) * self.dim])
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Cache file locations for an embedding file: keyed by its base name.
pub fn cache_paths(source: &Path, cache_dir: &Path) -> (PathBuf, PathBuf) {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "embeddings".to_string());
    (
        cache_dir.join(format!("{name}.safetensors")),
        cache_dir.join(format!("{name}.words.json")),
    )
}

/// How many vocabulary rows were filled from the pretrained table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddingCoverage {
    pub found: usize,
    pub missing: usize,
}

impl EmbeddingCoverage {
    /// Share of rows found in the table, in `[0.0, 1.0]`.
    pub fn ratio(&self) -> f32 {
        let total = self.found + self.missing;
        if total == 0 {
            0.0
        } else {
            self.found as f32 / total as f32
        }
    }
}

/// Dense `rows x dim` matrix; row `i` embeds the word with index `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Build the matrix for the first `num_words` indices of `tokenizer`.
    ///
    /// Row 0 (padding) and indices without a word stay zero. Words missing
    /// from `table` get a vector drawn from `N(0, 0.5)`.
    pub fn from_glove(
        tokenizer: &WordTokenizer,
        table: &GloveTable,
        num_words: usize,
        seed: u64,
    ) -> (Self, EmbeddingCoverage) {
        let dim = table.dim();
        let mut data = vec![0.0f32; num_words * dim];
        let mut rng = Rand32::new(seed);
        let mut coverage = EmbeddingCoverage::default();

        for (word, index) in tokenizer.ranked_words() {
            let i = index as usize;
            if i >= num_words {
                break;
            }
            let row = &mut data[i * dim..(i + 1) * dim];
            match table.get(word) {
                Some(vector) => {
                    row.copy_from_slice(vector);
                    coverage.found += 1;
                }
                None => {
                    for v in row.iter_mut() {
                        *v = sample_normal(&mut rng) * UNKNOWN_WORD_STDDEV;
                    }
                    coverage.missing += 1;
                }
            }
        }

        info!(
            "Embedding matrix {}x{}: {} words found, {} drawn at random",
            num_words, dim, coverage.found, coverage.missing
        );
        (
            Self {
                rows: num_words,
                dim,
                data,
            },
            coverage,
        )
    }

    /// Matrix of uniform values in `[-0.05, 0.05]` for training without a
    /// pretrained table.
    pub fn random_uniform(num_words: usize, dim: usize, seed: u64) -> Self {
        let mut rng = Rand32::new(seed);
        let data = (0..num_words * dim)
            .map(|_| (rng.rand_float() * 2.0 - 1.0) * UNIFORM_INIT_LIMIT)
            .collect();
        Self {
            rows: num_words,
            dim,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.rows {
            return None;
        }
        Some(&self.data[i * self.dim..(i + 1) * self.dim])
    }

    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(&self.data, (self.rows, self.dim), device)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_tensor(&Device::Cpu)?
            .save_safetensors(MATRIX_TENSOR, path.as_ref())?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let tensors = candle_core::safetensors::load(path.as_ref(), &Device::Cpu)?;
        let tensor = tensors
            .get(MATRIX_TENSOR)
            .ok_or_else(|| GlossaError::MissingColumn(MATRIX_TENSOR.to_string()))?;
        let (rows, dim) = tensor.dims2()?;
        Ok(Self {
            rows,
            dim,
            data: tensor.flatten_all()?.to_vec1::<f32>()?,
        })
    }
}

/// Standard normal sample (Box-Muller).
fn sample_normal(rng: &mut Rand32) -> f32 {
    let u1 = rng.rand_float().max(f32::MIN_POSITIVE);
    let u2 = rng.rand_float();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TokenizerConfig;
    use std::io::Write;

    fn write_glove(dir: &Path) -> PathBuf {
        let path = dir.join("tiny.3d.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "cat 0.1 0.2 0.3").unwrap();
        writeln!(file, "dog 1 2 3").unwrap();
        writeln!(file, "new york 4 5 6").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "cat 7 8 9").unwrap();
        path
    }

    #[test]
    fn test_parse_text_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = GloveTable::from_text(write_glove(dir.path()), 3).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get("dog"), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(table.get("new york"), Some(&[4.0, 5.0, 6.0][..]));
        // later duplicate wins
        assert_eq!(table.get("cat"), Some(&[7.0, 8.0, 9.0][..]));
        assert!(table.get("york").is_none());
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "ok 1 2\nbad 1 x\n").unwrap();

        match GloveTable::from_text(&path, 2) {
            Err(GlossaError::MalformedEmbedding { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }

        fs::write(&path, "short 1\n").unwrap();
        assert!(matches!(
            GloveTable::from_text(&path, 2),
            Err(GlossaError::MalformedEmbedding { line: 1, .. })
        ));
    }

    #[test]
    fn test_unicode_space_word_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nbsp.txt");
        fs::write(&path, "cat 1 2\n\u{a0} 3 4\r\ndog 5 6\n").unwrap();

        let table = GloveTable::from_text(&path, 2).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("\u{a0}"), Some(&[3.0, 4.0][..]));
        assert_eq!(table.get("dog"), Some(&[5.0, 6.0][..]));
    }

    #[test]
    fn test_cache_is_written_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_glove(dir.path());
        let cache = dir.path().join("cache");

        let first = GloveTable::load_cached(&source, 3, &cache).unwrap();
        let (vectors, words) = cache_paths(&source, &cache);
        assert!(vectors.exists());
        assert!(words.exists());

        // the cache must be used even once the source is gone
        fs::remove_file(&source).unwrap();
        let second = GloveTable::load_cached(&source, 3, &cache).unwrap();
        assert_eq!(second.len(), first.len());
        assert_eq!(second.get("new york"), first.get("new york"));
    }

    #[test]
    fn test_cache_with_other_dimension_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("table.txt");
        fs::write(&source, "a 1 2 3 4\n").unwrap();
        let cache = dir.path().join("cache");

        let table = GloveTable::load_cached(&source, 4, &cache).unwrap();
        assert_eq!(table.dim(), 4);
        // "a 1" + three 3-d values no longer fits: rebuilt from text with dim 3
        let table = GloveTable::load_cached(&source, 3, &cache).unwrap();
        assert_eq!(table.get("a 1"), Some(&[2.0, 3.0, 4.0][..]));
    }

    #[test]
    fn test_matrix_from_glove() {
        let dir = tempfile::tempdir().unwrap();
        let table = GloveTable::from_text(write_glove(dir.path()), 3).unwrap();

        let mut tok = WordTokenizer::new(TokenizerConfig::default()).unwrap();
        tok.fit_on_texts(["dog dog cat zebra", "lion"]);
        // dog=1, cat=2, zebra=3, lion=4; only indices < 4 are materialised
        let (matrix, coverage) = EmbeddingMatrix::from_glove(&tok, &table, 4, 7);

        assert_eq!(matrix.rows(), 4);
        assert_eq!(matrix.row(0), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(matrix.row(1), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(matrix.row(2), Some(&[7.0, 8.0, 9.0][..]));
        assert!(matrix.row(3).unwrap().iter().any(|v| *v != 0.0));
        assert_eq!(coverage, EmbeddingCoverage { found: 2, missing: 1 });
        assert!((coverage.ratio() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_matrix_is_seeded() {
        let a = EmbeddingMatrix::random_uniform(5, 4, 11);
        let b = EmbeddingMatrix::random_uniform(5, 4, 11);
        assert_eq!(a, b);
        assert!(a
            .row(2)
            .unwrap()
            .iter()
            .all(|v| v.abs() <= UNIFORM_INIT_LIMIT));
    }

    #[test]
    fn test_matrix_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedding.safetensors");
        let matrix = EmbeddingMatrix::random_uniform(3, 2, 1);
        matrix.save(&path).unwrap();
        assert_eq!(EmbeddingMatrix::load(&path).unwrap(), matrix);
    }
}
