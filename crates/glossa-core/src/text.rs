//! # Text Normalization
//!
//! Splits raw comments into word sequences and manages the stop-word list
//! that is removed before words are counted or indexed.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Characters stripped from text before splitting.
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Default word separator.
pub const DEFAULT_SPLIT: char = ' ';

/// Compiled text filter: lower-casing, filter characters and separator.
#[derive(Debug, Clone)]
pub struct TextFilter {
    pattern: Option<Regex>,
    lower: bool,
    split: char,
}

impl TextFilter {
    /// Build a filter that replaces every character of `filters` with `split`.
    pub fn new(filters: &str, lower: bool, split: char) -> Result<Self> {
        let pattern = if filters.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("[{}]", regex::escape(filters)))?)
        };
        Ok(Self {
            pattern,
            lower,
            split,
        })
    }

    /// Convert a text to its sequence of words.
    pub fn words(&self, text: &str) -> Vec<String> {
        let text = if self.lower {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut buf = [0u8; 4];
        let split: &str = self.split.encode_utf8(&mut buf);
        let replaced = match &self.pattern {
            Some(pattern) => pattern.replace_all(&text, NoExpand(split)).into_owned(),
            None => text,
        };

        replaced
            .split(self.split)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One-shot helper around [`TextFilter`].
///
/// # Examples
/// ```
/// use glossa_core::text::{text_to_word_sequence, DEFAULT_FILTERS};
///
/// let words = text_to_word_sequence("Hello, World!", DEFAULT_FILTERS, true, ' ').unwrap();
/// assert_eq!(words, vec!["hello", "world"]);
/// ```
pub fn text_to_word_sequence(
    text: &str,
    filters: &str,
    lower: bool,
    split: char,
) -> Result<Vec<String>> {
    Ok(TextFilter::new(filters, lower, split)?.words(text))
}

/// A set of words excluded from vocabularies and sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    /// Empty stop-word list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a stop-word file: one token per line, `#` starts a comment line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut words = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            words.insert(line.to_lowercase());
        }
        debug!(
            "Loaded {} stop words from {}",
            words.len(),
            path.as_ref().display()
        );
        Ok(Self { words })
    }

    /// Build from an iterator of words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Drop stop words from a word sequence in place.
    pub fn retain_content(&self, words: &mut Vec<String>) {
        if !self.words.is_empty() {
            words.retain(|w| !self.words.contains(w));
        }
    }
}
