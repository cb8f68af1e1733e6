//! # Word Tokenizer
//!
//! Frequency-ranked word vocabulary. Words are counted over the training
//! corpus, ranked by descending frequency (ties keep first-seen order) and
//! assigned 1-based indices; index 0 is reserved for padding.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GlossaError, Result};
use crate::text::{DEFAULT_FILTERS, DEFAULT_SPLIT, StopWords, TextFilter};

/// Tokenizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Only the `num_words - 1` most frequent words are emitted by
    /// [`WordTokenizer::texts_to_sequences`]. `None` keeps all of them.
    pub num_words: Option<usize>,
    /// Characters replaced by the separator before splitting.
    pub filters: String,
    /// Lower-case text before splitting.
    pub lower: bool,
    /// Word separator.
    pub split: char,
    /// Token standing in for out-of-vocabulary words.
    pub oov_token: Option<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            num_words: None,
            filters: DEFAULT_FILTERS.to_string(),
            lower: true,
            split: DEFAULT_SPLIT,
            oov_token: None,
        }
    }
}

impl TokenizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the emitted vocabulary.
    pub fn with_num_words(mut self, num_words: usize) -> Self {
        self.num_words = Some(num_words);
        self
    }

    pub fn with_filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = filters.into();
        self
    }

    pub fn with_lower(mut self, lower: bool) -> Self {
        self.lower = lower;
        self
    }

    pub fn with_oov_token(mut self, token: impl Into<String>) -> Self {
        self.oov_token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WordStat {
    word: String,
    count: usize,
    docs: usize,
}

/// Vocabulary builder and text-to-index encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTokenizer {
    config: TokenizerConfig,
    stop_words: StopWords,
    /// Word statistics in first-seen order.
    stats: Vec<WordStat>,
    document_count: usize,
    /// Words ordered by index; `ranked[i]` has index `i + 1`.
    ranked: Vec<String>,

    #[serde(skip)]
    positions: HashMap<String, usize>,
    #[serde(skip)]
    word_index: HashMap<String, u32>,
    #[serde(skip)]
    filter: Option<TextFilter>,
}

impl WordTokenizer {
    /// Create an empty tokenizer.
    pub fn new(config: TokenizerConfig) -> Result<Self> {
        let filter = TextFilter::new(&config.filters, config.lower, config.split)?;
        Ok(Self {
            config,
            stop_words: StopWords::new(),
            stats: Vec::new(),
            document_count: 0,
            ranked: Vec::new(),
            positions: HashMap::new(),
            word_index: HashMap::new(),
            filter: Some(filter),
        })
    }

    /// Exclude these words from counting and encoding.
    pub fn with_stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = stop_words;
        self
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    /// Split a text into words, with stop words removed.
    pub fn words(&self, text: &str) -> Vec<String> {
        let mut words = match &self.filter {
            Some(filter) => filter.words(text),
            None => Vec::new(),
        };
        self.stop_words.retain_content(&mut words);
        words
    }

    /// Update word statistics from `texts` and rebuild the index.
    pub fn fit_on_texts<I, S>(&mut self, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for text in texts {
            self.document_count += 1;
            let words = self.words(text.as_ref());
            let mut seen: HashSet<&str> = HashSet::with_capacity(words.len());
            for word in &words {
                let pos = match self.positions.get(word.as_str()) {
                    Some(&pos) => pos,
                    None => {
                        self.stats.push(WordStat {
                            word: word.clone(),
                            count: 0,
                            docs: 0,
                        });
                        self.positions.insert(word.clone(), self.stats.len() - 1);
                        self.stats.len() - 1
                    }
                };
                self.stats[pos].count += 1;
                if seen.insert(word.as_str()) {
                    self.stats[pos].docs += 1;
                }
            }
        }

        self.rebuild_index();
        info!(
            "Fitted tokenizer on {} documents, {} distinct words",
            self.document_count,
            self.stats.len()
        );
    }

    fn rebuild_index(&mut self) {
        let mut order: Vec<usize> = (0..self.stats.len()).collect();
        // stable: equal counts keep first-seen order
        order.sort_by(|&a, &b| self.stats[b].count.cmp(&self.stats[a].count));

        self.ranked = Vec::with_capacity(order.len() + 1);
        if let Some(oov) = &self.config.oov_token {
            self.ranked.push(oov.clone());
        }
        self.ranked
            .extend(order.into_iter().map(|i| self.stats[i].word.clone()));

        self.word_index = HashMap::with_capacity(self.ranked.len());
        for (i, word) in self.ranked.iter().enumerate() {
            // An OOV token that also occurs in the corpus keeps its first slot.
            self.word_index.entry(word.clone()).or_insert(i as u32 + 1);
        }
    }

    fn rebuild_lookups(&mut self) -> Result<()> {
        self.filter = Some(TextFilter::new(
            &self.config.filters,
            self.config.lower,
            self.config.split,
        )?);
        self.positions = self
            .stats
            .iter()
            .enumerate()
            .map(|(i, s)| (s.word.clone(), i))
            .collect();
        self.word_index = HashMap::with_capacity(self.ranked.len());
        for (i, word) in self.ranked.iter().enumerate() {
            self.word_index.entry(word.clone()).or_insert(i as u32 + 1);
        }
        Ok(())
    }

    /// Whether [`fit_on_texts`](Self::fit_on_texts) has seen any document.
    pub fn is_fitted(&self) -> bool {
        self.document_count > 0
    }

    /// Index of the OOV token, if one is configured.
    pub fn oov_index(&self) -> Option<u32> {
        self.config
            .oov_token
            .as_ref()
            .and_then(|t| self.word_index.get(t).copied())
    }

    /// Encode one text; unknown or out-of-range words are dropped, or mapped
    /// to the OOV index when one is configured.
    pub fn text_to_sequence(&self, text: &str) -> Vec<u32> {
        let limit = self.config.num_words.filter(|&n| n > 0);
        let oov = self.oov_index();
        let mut seq = Vec::new();
        for word in self.words(text) {
            match self.word_index.get(&word) {
                Some(&i) if limit.is_some_and(|n| i as usize >= n) => {
                    if let Some(oov) = oov {
                        seq.push(oov);
                    }
                }
                Some(&i) => seq.push(i),
                None => {
                    if let Some(oov) = oov {
                        seq.push(oov);
                    }
                }
            }
        }
        seq
    }

    /// Encode many texts.
    pub fn texts_to_sequences<I, S>(&self, texts: I) -> Vec<Vec<u32>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        texts
            .into_iter()
            .map(|t| self.text_to_sequence(t.as_ref()))
            .collect()
    }

    /// Full word index, including words beyond `num_words`.
    pub fn word_index(&self) -> &HashMap<String, u32> {
        &self.word_index
    }

    /// Words with their index, most frequent first.
    pub fn ranked_words(&self) -> impl Iterator<Item = (&str, u32)> {
        self.ranked
            .iter()
            .enumerate()
            .map(|(i, w)| (w.as_str(), i as u32 + 1))
    }

    /// Word stored at `index`.
    pub fn index_word(&self, index: u32) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.ranked.get(index as usize - 1).map(String::as_str)
    }

    pub fn word_count(&self, word: &str) -> usize {
        self.positions
            .get(word)
            .map(|&p| self.stats[p].count)
            .unwrap_or(0)
    }

    /// Number of documents containing `word`.
    pub fn word_docs(&self, word: &str) -> usize {
        self.positions
            .get(word)
            .map(|&p| self.stats[p].docs)
            .unwrap_or(0)
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Number of distinct words seen during fitting.
    pub fn vocabulary_size(&self) -> usize {
        self.stats.len()
    }

    /// The `n` most frequent words with their counts.
    pub fn most_common(&self, n: usize) -> Vec<(&str, usize)> {
        self.ranked
            .iter()
            .filter_map(|w| self.positions.get(w).map(|&p| (w.as_str(), self.stats[p].count)))
            .take(n)
            .collect()
    }

    /// Persist the tokenizer as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path.as_ref(), json)?;
        debug!("Tokenizer saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Load a tokenizer written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut tokenizer: Self = serde_json::from_str(&content)?;
        if tokenizer.stats.len() + usize::from(tokenizer.config.oov_token.is_some())
            < tokenizer.ranked.len()
        {
            return Err(GlossaError::InvalidConfig(format!(
                "tokenizer file {} is inconsistent",
                path.as_ref().display()
            )));
        }
        tokenizer.rebuild_lookups()?;
        Ok(tokenizer)
    }
}
