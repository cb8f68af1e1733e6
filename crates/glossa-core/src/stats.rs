//! # Dataset Statistics
//!
//! Summary of a labelled dataset as seen through the tokenizer: class
//! balance, comment lengths in words, vocabulary and optional coverage by a
//! pretrained embedding table.

use std::fmt;

use serde::Serialize;

use crate::dataset::Dataset;
use crate::embeddings::GloveTable;
use crate::error::{GlossaError, Result};
use crate::text::StopWords;
use crate::tokenizer::{TokenizerConfig, WordTokenizer};

/// Word-length distribution of the comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LengthStats {
    pub min: usize,
    pub max: usize,
    pub mean: f32,
    pub median: usize,
    pub p95: usize,
}

impl LengthStats {
    /// Compute from unsorted lengths. Empty input gives all zeros.
    pub fn from_lengths(mut lengths: Vec<usize>) -> Self {
        if lengths.is_empty() {
            return Self::default();
        }
        lengths.sort_unstable();
        let n = lengths.len();
        let total: usize = lengths.iter().sum();
        Self {
            min: lengths[0],
            max: lengths[n - 1],
            mean: total as f32 / n as f32,
            median: lengths[n / 2],
            p95: lengths[((n as f32 * 0.95).ceil() as usize).clamp(1, n) - 1],
        }
    }
}

/// What survives a `num_words` vocabulary cut-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CutoffStats {
    pub num_words: usize,
    /// Distinct words with an index below `num_words`.
    pub kept_words: usize,
    /// Share of all word occurrences whose word is kept.
    pub token_coverage: f32,
}

/// Statistics printed by the `info` tool.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub samples: usize,
    pub positives: usize,
    pub negatives: usize,
    pub lengths: LengthStats,
    pub sequence_length: usize,
    /// Comments with more words than `sequence_length`.
    pub truncated: usize,
    pub vocabulary_size: usize,
    /// Effect of the tokenizer's `num_words` cut-off, when one is set.
    pub cutoff: Option<CutoffStats>,
    pub top_words: Vec<(String, usize)>,
    pub stop_words: usize,
    /// Share of the vocabulary present in the embedding table.
    pub embedding_coverage: Option<f32>,
}

impl DatasetStats {
    /// Tokenize every comment and summarise the result. When `table` is given
    /// the share of vocabulary words it contains is reported as well.
    pub fn compute(
        dataset: &Dataset,
        config: TokenizerConfig,
        stop_words: StopWords,
        sequence_length: usize,
        top_n: usize,
        table: Option<&GloveTable>,
    ) -> Result<Self> {
        if dataset.is_empty() {
            return Err(GlossaError::EmptyInput);
        }
        let stop_count = stop_words.len();
        let mut tokenizer = WordTokenizer::new(config)?.with_stop_words(stop_words);
        tokenizer.fit_on_texts(dataset.texts());

        let lengths: Vec<usize> = dataset
            .samples()
            .iter()
            .map(|s| tokenizer.words(&s.text).len())
            .collect();
        let truncated = lengths.iter().filter(|&&l| l > sequence_length).count();
        let positives = dataset.positives();

        let cutoff = tokenizer.config().num_words.map(|num_words| {
            let total: usize = tokenizer
                .ranked_words()
                .map(|(w, _)| tokenizer.word_count(w))
                .sum();
            let (kept_words, kept_tokens) = tokenizer
                .ranked_words()
                .filter(|&(w, i)| (i as usize) < num_words && tokenizer.word_count(w) > 0)
                .fold((0, 0), |(n, t), (w, _)| (n + 1, t + tokenizer.word_count(w)));
            CutoffStats {
                num_words,
                kept_words,
                token_coverage: if total == 0 {
                    0.0
                } else {
                    kept_tokens as f32 / total as f32
                },
            }
        });

        let embedding_coverage = table.map(|table| {
            let total = tokenizer.vocabulary_size();
            if total == 0 {
                return 0.0;
            }
            let found = tokenizer
                .ranked_words()
                .filter(|(w, _)| table.contains(w))
                .count();
            found as f32 / total as f32
        });

        Ok(Self {
            samples: dataset.len(),
            positives,
            negatives: dataset.len() - positives,
            lengths: LengthStats::from_lengths(lengths),
            sequence_length,
            truncated,
            vocabulary_size: tokenizer.vocabulary_size(),
            cutoff,
            top_words: tokenizer
                .most_common(top_n)
                .into_iter()
                .map(|(w, c)| (w.to_string(), c))
                .collect(),
            stop_words: stop_count,
            embedding_coverage,
        })
    }

    pub fn positive_ratio(&self) -> f32 {
        if self.samples == 0 {
            0.0
        } else {
            self.positives as f32 / self.samples as f32
        }
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples:          {}", self.samples)?;
        writeln!(
            f,
            "Positive:         {} ({:.2}%)",
            self.positives,
            self.positive_ratio() * 100.0
        )?;
        writeln!(f, "Negative:         {}", self.negatives)?;
        writeln!(
            f,
            "Words/comment:    min {} / median {} / mean {:.1} / p95 {} / max {}",
            self.lengths.min,
            self.lengths.median,
            self.lengths.mean,
            self.lengths.p95,
            self.lengths.max
        )?;
        writeln!(
            f,
            "Truncated:        {} comments longer than {} words",
            self.truncated, self.sequence_length
        )?;
        writeln!(f, "Vocabulary:       {} words", self.vocabulary_size)?;
        if let Some(cutoff) = &self.cutoff {
            writeln!(
                f,
                "Kept by cut-off:  {} words below index {} ({:.2}% of tokens)",
                cutoff.kept_words,
                cutoff.num_words,
                cutoff.token_coverage * 100.0
            )?;
        }
        writeln!(f, "Stop words:       {}", self.stop_words)?;
        if let Some(coverage) = self.embedding_coverage {
            writeln!(f, "GloVe coverage:   {:.2}%", coverage * 100.0)?;
        }
        if !self.top_words.is_empty() {
            writeln!(f, "Most frequent:")?;
            for (word, count) in &self.top_words {
                writeln!(f, "  {word:<20} {count}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Comment;
    use std::fs;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Comment::new("You are a great person", 0.0),
            Comment::new("you are an idiot, a total idiot", 1.0),
            Comment::new("thanks", 0.0),
            Comment::new("the edit was reverted", 0.0),
        ])
    }

    #[test]
    fn test_length_stats() {
        let stats = LengthStats::from_lengths(vec![5, 1, 3, 2, 4]);
        assert_eq!(stats.min, 1);
        assert_eq!(stats.max, 5);
        assert_eq!(stats.median, 3);
        assert_eq!(stats.p95, 5);
        assert!((stats.mean - 3.0).abs() < 1e-6);
        assert_eq!(LengthStats::from_lengths(Vec::new()), LengthStats::default());
    }

    #[test]
    fn test_compute_stats() {
        let stats = DatasetStats::compute(
            &dataset(),
            TokenizerConfig::default(),
            StopWords::from_words(["a", "an", "the"]),
            4,
            2,
            None,
        )
        .unwrap();

        assert_eq!(stats.samples, 4);
        assert_eq!(stats.positives, 1);
        assert_eq!(stats.negatives, 3);
        // "you are idiot total idiot" has 5 words
        assert_eq!(stats.lengths.max, 5);
        assert_eq!(stats.truncated, 1);
        assert_eq!(stats.top_words[0], ("you".to_string(), 2));
        assert_eq!(stats.stop_words, 3);
        assert!(stats.embedding_coverage.is_none());
        assert!((stats.positive_ratio() - 0.25).abs() < 1e-6);

        let rendered = stats.to_string();
        assert!(rendered.contains("Samples:          4"));
        assert!(rendered.contains("Most frequent:"));
    }

    #[test]
    fn test_num_words_cutoff() {
        let stats = DatasetStats::compute(
            &dataset(),
            TokenizerConfig::default().with_num_words(3),
            StopWords::from_words(["a", "an", "the"]),
            4,
            2,
            None,
        )
        .unwrap();

        // "you" and "are" take indices 1 and 2: 4 of 13 tokens
        let cutoff = stats.cutoff.unwrap();
        assert_eq!(cutoff.num_words, 3);
        assert_eq!(cutoff.kept_words, 2);
        assert!((cutoff.token_coverage - 4.0 / 13.0).abs() < 1e-6);
        assert!(stats.to_string().contains("Kept by cut-off:  2 words below index 3"));

        let unlimited = DatasetStats::compute(
            &dataset(),
            TokenizerConfig::default(),
            StopWords::new(),
            4,
            2,
            None,
        )
        .unwrap();
        assert!(unlimited.cutoff.is_none());
    }

    #[test]
    fn test_compute_with_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glove.txt");
        fs::write(&path, "thanks 0.1 0.2\nidiot 0.3 0.4\n").unwrap();
        let table = GloveTable::from_text(&path, 2).unwrap();

        let ds = Dataset::new(vec![
            Comment::new("thanks idiot", 1.0),
            Comment::new("zzz qqq", 0.0),
        ]);
        let stats = DatasetStats::compute(
            &ds,
            TokenizerConfig::default(),
            StopWords::new(),
            10,
            5,
            Some(&table),
        )
        .unwrap();
        assert_eq!(stats.embedding_coverage, Some(0.5));
        assert!(stats.to_string().contains("GloVe coverage:   50.00%"));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let result = DatasetStats::compute(
            &Dataset::default(),
            TokenizerConfig::default(),
            StopWords::new(),
            10,
            5,
            None,
        );
        assert!(matches!(result, Err(GlossaError::EmptyInput)));
    }
}
