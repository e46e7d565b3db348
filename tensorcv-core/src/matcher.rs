//! Brute-force Hamming matcher for binary descriptors.
//!
//! For every descriptor `i` of the query set the matcher scans candidate rows
//! of the train set, keeps the closest one (first index wins on ties) and
//! reports `(i, j)` when that distance is strictly below the threshold.
//!
//! By default the candidate range for row `i` is `j >= i`, which suits
//! matching a set against a later, heavily overlapping version of itself.
//! [`SearchRange::Full`] scans the whole train set instead.

use crate::descriptor::{validate_descriptor_length, DescriptorSet, WORD_BYTES};
use crate::error::{Error, Result};
use crate::tensor::Tensor;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which train rows are candidates for query row `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchRange {
    /// Rows `j >= i` only.
    #[default]
    FromRow,
    /// Every row of the train set.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchOptions {
    pub search_range: SearchRange,
    /// Spread query rows over the rayon pool. Output is identical.
    pub parallel: bool,
}

/// An accepted match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    /// Row in the query set.
    pub query: usize,
    /// Row in the train set.
    pub train: usize,
    /// Hamming distance in bits.
    pub distance: u32,
}

/// Matches plus the input sizes they were computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub matches: Vec<MatchPair>,
    pub query_rows: usize,
    pub train_rows: usize,
}

impl MatchReport {
    pub fn count(&self) -> usize {
        self.matches.len()
    }

    /// `(query, train)` index pairs.
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        self.matches.iter().map(|m| (m.query, m.train)).collect()
    }

    /// True when no rows were supplied, as opposed to rows that found no match.
    pub fn had_empty_input(&self) -> bool {
        self.query_rows == 0 || self.train_rows == 0
    }

    /// M x 2 table of `(query, train)` indices.
    pub fn to_tensor(&self) -> Result<Tensor<i64>> {
        let data = self
            .matches
            .iter()
            .flat_map(|m| [m.query as i64, m.train as i64])
            .collect();
        Tensor::new(data, vec![self.matches.len(), 2])
    }
}

#[inline]
fn word_distance(a: &[u8], b: &[u8]) -> u32 {
    a.chunks_exact(WORD_BYTES)
        .zip(b.chunks_exact(WORD_BYTES))
        .map(|(x, y)| {
            let x = u64::from_le_bytes(x.try_into().unwrap_or([0; WORD_BYTES]));
            let y = u64::from_le_bytes(y.try_into().unwrap_or([0; WORD_BYTES]));
            (x ^ y).count_ones()
        })
        .sum()
}

/// Number of differing bits between two descriptors of equal, word-aligned length.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Result<u32> {
    validate_descriptor_length(a.len())?;
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(word_distance(a, b))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryMatcher {
    options: MatchOptions,
}

impl BinaryMatcher {
    pub fn new(options: MatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Match every row of `query` against `train`.
    pub fn run(
        &self,
        query: &DescriptorSet,
        train: &DescriptorSet,
        threshold: u32,
    ) -> Result<MatchReport> {
        validate_descriptor_length(query.bytes_per_descriptor())?;
        if query.bytes_per_descriptor() != train.bytes_per_descriptor() {
            return Err(Error::DimensionMismatch {
                expected: query.bytes_per_descriptor(),
                actual: train.bytes_per_descriptor(),
            });
        }

        let matches: Vec<MatchPair> = if threshold == 0 || query.is_empty() || train.is_empty() {
            Vec::new()
        } else if self.options.parallel {
            (0..query.len())
                .into_par_iter()
                .filter_map(|i| self.best_match(query, train, i, threshold))
                .collect()
        } else {
            (0..query.len())
                .filter_map(|i| self.best_match(query, train, i, threshold))
                .collect()
        };

        debug!(
            query_rows = query.len(),
            train_rows = train.len(),
            words = query.words_per_descriptor(),
            threshold,
            matches = matches.len(),
            "matched descriptor sets"
        );

        Ok(MatchReport {
            matches,
            query_rows: query.len(),
            train_rows: train.len(),
        })
    }

    fn best_match(
        &self,
        query: &DescriptorSet,
        train: &DescriptorSet,
        i: usize,
        threshold: u32,
    ) -> Option<MatchPair> {
        let descriptor = query.row(i)?;
        let first = match self.options.search_range {
            SearchRange::FromRow => i,
            SearchRange::Full => 0,
        };

        let mut best: Option<(usize, u32)> = None;
        for (j, candidate) in train.rows().enumerate().skip(first) {
            let distance = word_distance(descriptor, candidate);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((j, distance));
            }
        }

        best.filter(|&(_, distance)| distance < threshold)
            .map(|(train, distance)| MatchPair {
                query: i,
                train,
                distance,
            })
    }
}

/// Match with the default options (rows `j >= i`, sequential).
pub fn match_descriptors(
    query: &DescriptorSet,
    train: &DescriptorSet,
    threshold: u32,
) -> Result<Vec<MatchPair>> {
    Ok(BinaryMatcher::default().run(query, train, threshold)?.matches)
}

/// Threshold as received from a host with signed integers.
pub fn threshold_from_host(threshold: i64) -> Result<u32> {
    if threshold < 0 {
        return Err(Error::InvalidThreshold(threshold));
    }
    Ok(u32::try_from(threshold).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rows: &[u64]) -> DescriptorSet {
        let rows: Vec<[u8; 8]> = rows.iter().map(|r| r.to_le_bytes()).collect();
        DescriptorSet::from_rows(8, &rows).unwrap()
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(&[0u8; 8], &[0xFFu8; 8]).unwrap(), 64);
        assert_eq!(hamming_distance(&[0x0Fu8; 16], &[0x0Fu8; 16]).unwrap(), 0);
        let a = 0b1011u64.to_le_bytes();
        let b = 0b0001u64.to_le_bytes();
        assert_eq!(hamming_distance(&a, &b).unwrap(), 2);
        assert_eq!(hamming_distance(&b, &a).unwrap(), 2);
    }

    #[test]
    fn test_hamming_distance_rejects_bad_lengths() {
        assert!(matches!(
            hamming_distance(&[0u8; 7], &[0u8; 7]),
            Err(Error::InvalidDescriptorLength(7))
        ));
        assert!(matches!(
            hamming_distance(&[0u8; 8], &[0u8; 16]),
            Err(Error::DimensionMismatch { expected: 8, actual: 16 })
        ));
    }

    #[test]
    fn test_single_word_scenario() {
        let query = set(&[0]);
        let train = set(&[0, u64::MAX]);
        let matches = match_descriptors(&query, &train, 5).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].query, matches[0].train), (0, 0));
        assert_eq!(matches[0].distance, 0);
        assert!(match_descriptors(&query, &train, 0).unwrap().is_empty());
    }

    #[test]
    fn test_tie_keeps_first_and_range_starts_at_row() {
        let query = set(&[0x0F, 0xF0]);
        let train = set(&[0x0F, 0x0F]);
        let report = BinaryMatcher::default().run(&query, &train, 9).unwrap();
        assert_eq!(report.pairs(), vec![(0, 0), (1, 1)]);
        assert_eq!(report.matches[1].distance, 8);
        assert_eq!(report.count(), 2);
    }

    #[test]
    fn test_full_range_considers_earlier_rows() {
        let query = set(&[0xFF, 0x01]);
        let train = set(&[0x01, 0xFF]);
        let from_row = BinaryMatcher::default().run(&query, &train, 64).unwrap();
        assert_eq!(from_row.pairs(), vec![(0, 1), (1, 1)]);

        let full = BinaryMatcher::new(MatchOptions {
            search_range: SearchRange::Full,
            parallel: false,
        })
        .run(&query, &train, 64)
        .unwrap();
        assert_eq!(full.pairs(), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_rows_past_train_end_are_skipped() {
        let query = set(&[0, 0, 0]);
        let train = set(&[0]);
        let report = BinaryMatcher::default().run(&query, &train, 100).unwrap();
        assert_eq!(report.pairs(), vec![(0, 0)]);
    }

    #[test]
    fn test_empty_inputs_yield_no_matches() {
        let empty = DescriptorSet::empty(8).unwrap();
        let train = set(&[0, 1]);
        let report = BinaryMatcher::default().run(&empty, &train, 10).unwrap();
        assert_eq!(report.count(), 0);
        assert!(report.had_empty_input());

        let report = BinaryMatcher::default().run(&train, &empty, 10).unwrap();
        assert_eq!(report.count(), 0);
        assert!(report.had_empty_input());
    }

    #[test]
    fn test_no_match_is_not_empty_input() {
        let report = BinaryMatcher::default()
            .run(&set(&[0]), &set(&[u64::MAX]), 10)
            .unwrap();
        assert_eq!(report.count(), 0);
        assert!(!report.had_empty_input());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = DescriptorSet::new(vec![0; 8], 8).unwrap();
        let b = DescriptorSet::new(vec![0; 16], 16).unwrap();
        assert!(matches!(
            BinaryMatcher::default().run(&a, &b, 10),
            Err(Error::DimensionMismatch { expected: 8, actual: 16 })
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let rows: Vec<u64> = (0..200u64).map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15)).collect();
        let query = set(&rows);
        let train = set(&rows.iter().rev().copied().collect::<Vec<_>>());
        for range in [SearchRange::FromRow, SearchRange::Full] {
            let seq = BinaryMatcher::new(MatchOptions { search_range: range, parallel: false })
                .run(&query, &train, 40)
                .unwrap();
            let par = BinaryMatcher::new(MatchOptions { search_range: range, parallel: true })
                .run(&query, &train, 40)
                .unwrap();
            assert_eq!(seq, par);
        }
    }

    #[test]
    fn test_to_tensor() {
        let report = BinaryMatcher::default()
            .run(&set(&[0x0F, 0xF0]), &set(&[0x0F, 0x0F]), 9)
            .unwrap();
        let table = report.to_tensor().unwrap();
        assert_eq!(table.shape(), &[2, 2]);
        assert_eq!(table.to_vec(), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_threshold_from_host() {
        assert_eq!(threshold_from_host(5).unwrap(), 5);
        assert_eq!(threshold_from_host(0).unwrap(), 0);
        assert!(matches!(threshold_from_host(-1), Err(Error::InvalidThreshold(-1))));
        assert_eq!(threshold_from_host(i64::MAX).unwrap(), u32::MAX);
    }
}
