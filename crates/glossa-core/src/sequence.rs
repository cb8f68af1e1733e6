//! # Sequence Padding
//!
//! Turns ragged index sequences into a dense `rows x maxlen` matrix ready to
//! be fed to the network.

use serde::{Deserialize, Serialize};

use crate::error::{GlossaError, Result};

/// Which side receives padding values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Padding {
    /// Pad at the start of the sequence.
    #[default]
    Pre,
    /// Pad at the end of the sequence.
    Post,
}

/// Which side is cut from sequences longer than `maxlen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Truncating {
    /// Drop leading items, keeping the last `maxlen`.
    #[default]
    Pre,
    /// Drop trailing items, keeping the first `maxlen`.
    Post,
}

/// Dense row-major matrix of padded sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedSequences {
    data: Vec<u32>,
    rows: usize,
    maxlen: usize,
}

impl PaddedSequences {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Row `i`, or `None` when out of range.
    pub fn row(&self, i: usize) -> Option<&[u32]> {
        if i >= self.rows {
            return None;
        }
        Some(&self.data[i * self.maxlen..(i + 1) * self.maxlen])
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    /// Copy the given rows, in order, into a new flat buffer.
    pub fn gather(&self, indices: &[usize]) -> Vec<u32> {
        let mut out = Vec::with_capacity(indices.len() * self.maxlen);
        for &i in indices {
            if let Some(row) = self.row(i) {
                out.extend_from_slice(row);
            }
        }
        out
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.data
    }
}

/// Pad or truncate every sequence to exactly `maxlen` items.
///
/// # Examples
/// ```
/// use glossa_core::sequence::{pad_sequences, Padding, Truncating};
///
/// let padded = pad_sequences(&[vec![1, 2], vec![3, 4, 5, 6]], 3, Padding::Pre, Truncating::Pre, 0).unwrap();
/// assert_eq!(padded.row(0), Some(&[0, 1, 2][..]));
/// assert_eq!(padded.row(1), Some(&[4, 5, 6][..]));
/// ```
pub fn pad_sequences(
    sequences: &[Vec<u32>],
    maxlen: usize,
    padding: Padding,
    truncating: Truncating,
    value: u32,
) -> Result<PaddedSequences> {
    if maxlen == 0 {
        return Err(GlossaError::InvalidConfig(
            "sequence length must be positive".into(),
        ));
    }

    let mut data = vec![value; sequences.len() * maxlen];
    for (row, seq) in data.chunks_exact_mut(maxlen).zip(sequences) {
        let kept: &[u32] = if seq.len() > maxlen {
            match truncating {
                Truncating::Pre => &seq[seq.len() - maxlen..],
                Truncating::Post => &seq[..maxlen],
            }
        } else {
            seq
        };

        match padding {
            Padding::Pre => row[maxlen - kept.len()..].copy_from_slice(kept),
            Padding::Post => row[..kept.len()].copy_from_slice(kept),
        }
    }

    Ok(PaddedSequences {
        data,
        rows: sequences.len(),
        maxlen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_padding_and_truncation() {
        let seqs = vec![vec![1], vec![1, 2, 3, 4, 5], vec![]];
        let padded = pad_sequences(&seqs, 3, Padding::Pre, Truncating::Pre, 0).unwrap();

        assert_eq!(padded.rows(), 3);
        assert_eq!(padded.as_slice(), &[0, 0, 1, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn test_post_padding_and_truncation() {
        let seqs = vec![vec![1], vec![1, 2, 3, 4, 5]];
        let padded = pad_sequences(&seqs, 3, Padding::Post, Truncating::Post, 9).unwrap();
        assert_eq!(padded.row(0), Some(&[1, 9, 9][..]));
        assert_eq!(padded.row(1), Some(&[1, 2, 3][..]));
        assert_eq!(padded.row(2), None);
    }

    #[test]
    fn test_exact_length_untouched() {
        let padded = pad_sequences(&[vec![7, 8]], 2, Padding::Pre, Truncating::Pre, 0).unwrap();
        assert_eq!(padded.as_slice(), &[7, 8]);
    }

    #[test]
    fn test_empty_input() {
        let padded = pad_sequences(&[], 4, Padding::Pre, Truncating::Pre, 0).unwrap();
        assert!(padded.is_empty());
        assert!(padded.as_slice().is_empty());
    }

    #[test]
    fn test_zero_maxlen_rejected() {
        assert!(pad_sequences(&[vec![1]], 0, Padding::Pre, Truncating::Pre, 0).is_err());
    }

    #[test]
    fn test_gather_rows() {
        let padded =
            pad_sequences(&[vec![1], vec![2], vec![3]], 2, Padding::Pre, Truncating::Pre, 0)
                .unwrap();
        assert_eq!(padded.gather(&[2, 0]), vec![0, 3, 0, 1]);
    }
}
