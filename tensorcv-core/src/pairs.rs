//! Descriptor bit selection for training binary descriptors.
//!
//! Given descriptors extracted from a training corpus, pick the bits that are
//! most informative: bits whose mean is closest to 0.5 come first, and a bit
//! is kept only while its correlation with every bit kept so far stays below
//! the threshold. The selected bit indices become the pair list of a trained
//! descriptor extractor.

use crate::descriptor::DescriptorSet;
use crate::error::{Error, Result};
use tracing::{debug, warn};

/// Upper bound on the number of selected pairs (512 bits = 64-byte descriptor).
pub const DEFAULT_MAX_PAIRS: usize = crate::config::FREAK_DESCRIPTOR_PAIRS;

/// One descriptor bit across all training rows, packed 64 rows per word.
struct BitColumn {
    words: Vec<u64>,
    ones: u32,
}

#[inline]
fn bit_at(row: &[u8], bit: usize) -> bool {
    (row[bit / 8] >> (bit % 8)) & 1 == 1
}

fn pack_columns(sets: &[DescriptorSet], bits: usize, rows: usize) -> Vec<BitColumn> {
    let words = rows.div_ceil(64);
    let mut columns: Vec<BitColumn> = (0..bits)
        .map(|_| BitColumn {
            words: vec![0; words],
            ones: 0,
        })
        .collect();
    for (r, row) in sets.iter().flat_map(|s| s.rows()).enumerate() {
        for (bit, column) in columns.iter_mut().enumerate() {
            if bit_at(row, bit) {
                column.words[r / 64] |= 1 << (r % 64);
                column.ones += 1;
            }
        }
    }
    columns
}

/// Pearson correlation of two binary columns. Constant columns count as
/// fully correlated.
fn correlation(a: &BitColumn, b: &BitColumn, rows: usize) -> f64 {
    let n = rows as f64;
    let pa = a.ones as f64 / n;
    let pb = b.ones as f64 / n;
    let var = pa * (1.0 - pa) * pb * (1.0 - pb);
    if var <= 0.0 {
        return 1.0;
    }
    let both: u32 = a
        .words
        .iter()
        .zip(&b.words)
        .map(|(x, y)| (x & y).count_ones())
        .sum();
    let pab = both as f64 / n;
    (pab - pa * pb) / var.sqrt()
}

/// Select up to `max_pairs` bit indices from the descriptors in `sets`.
///
/// `corr_threshold` must lie in `(0, 1]`. Fewer than `max_pairs` indices are
/// returned when the threshold rejects too many bits.
pub fn select_pairs(
    sets: &[DescriptorSet],
    corr_threshold: f64,
    max_pairs: usize,
) -> Result<Vec<u32>> {
    if !(corr_threshold > 0.0 && corr_threshold <= 1.0) {
        return Err(Error::Configuration(format!(
            "correlation threshold must be in (0, 1], got {}",
            corr_threshold
        )));
    }
    let first = sets
        .iter()
        .find(|s| !s.is_empty())
        .ok_or_else(|| Error::EmptyInput("no training descriptors".to_string()))?;
    let bytes = first.bytes_per_descriptor();
    if let Some(other) = sets.iter().find(|s| s.bytes_per_descriptor() != bytes) {
        return Err(Error::DimensionMismatch {
            expected: bytes,
            actual: other.bytes_per_descriptor(),
        });
    }

    let bits = bytes * 8;
    let rows: usize = sets.iter().map(|s| s.len()).sum();
    let columns = pack_columns(sets, bits, rows);

    let mut order: Vec<usize> = (0..bits).collect();
    order.sort_by(|&a, &b| {
        let da = (columns[a].ones as f64 / rows as f64 - 0.5).abs();
        let db = (columns[b].ones as f64 / rows as f64 - 0.5).abs();
        da.total_cmp(&db)
    });

    let mut selected: Vec<usize> = Vec::with_capacity(max_pairs.min(bits));
    for &bit in &order {
        if selected.len() >= max_pairs {
            break;
        }
        let independent = selected
            .iter()
            .all(|&kept| correlation(&columns[bit], &columns[kept], rows).abs() < corr_threshold);
        if selected.is_empty() || independent {
            selected.push(bit);
        }
    }

    if selected.len() < max_pairs.min(bits) {
        warn!(
            selected = selected.len(),
            requested = max_pairs,
            corr_threshold,
            "correlation threshold rejected too many bits"
        );
    }
    debug!(rows, bits, selected = selected.len(), "selected descriptor pairs");

    Ok(selected.into_iter().map(|b| b as u32).collect())
}
