//! Fixed-length binary descriptor sets.

use crate::error::{Error, Result};
use crate::layout::{MatLayout, MatrixView};
use crate::tensor::Tensor;

/// Bytes per 64-bit word; descriptor lengths must be a multiple of this.
pub const WORD_BYTES: usize = std::mem::size_of::<u64>();

/// Check that `bytes` can be split into whole 64-bit words.
pub fn validate_descriptor_length(bytes: usize) -> Result<()> {
    if bytes == 0 || bytes % WORD_BYTES != 0 {
        return Err(Error::InvalidDescriptorLength(bytes));
    }
    Ok(())
}

/// N descriptors of D bytes each, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSet {
    data: Vec<u8>,
    bytes_per_descriptor: usize,
}

impl DescriptorSet {
    pub fn new(data: Vec<u8>, bytes_per_descriptor: usize) -> Result<Self> {
        validate_descriptor_length(bytes_per_descriptor)?;
        if data.len() % bytes_per_descriptor != 0 {
            return Err(Error::Shape(format!(
                "{} bytes is not a whole number of {}-byte descriptors",
                data.len(),
                bytes_per_descriptor
            )));
        }
        Ok(Self {
            data,
            bytes_per_descriptor,
        })
    }

    /// Set with no rows.
    pub fn empty(bytes_per_descriptor: usize) -> Result<Self> {
        Self::new(Vec::new(), bytes_per_descriptor)
    }

    /// Build from individual rows, which must all be `bytes_per_descriptor` long.
    pub fn from_rows<R: AsRef<[u8]>>(bytes_per_descriptor: usize, rows: &[R]) -> Result<Self> {
        validate_descriptor_length(bytes_per_descriptor)?;
        let mut data = Vec::with_capacity(rows.len() * bytes_per_descriptor);
        for row in rows {
            let row = row.as_ref();
            if row.len() != bytes_per_descriptor {
                return Err(Error::DimensionMismatch {
                    expected: bytes_per_descriptor,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(data, bytes_per_descriptor)
    }

    /// Take an N x D byte tensor, copying it into row-major order if needed.
    pub fn from_tensor(tensor: &Tensor<u8>) -> Result<Self> {
        let view = MatrixView::new(tensor);
        match view.layout {
            MatLayout::Matrix { cols, .. } => Self::new(view.tensor.into_vec(), cols),
            _ => Err(Error::Shape(format!(
                "descriptor tensor must be N x D, got {:?}",
                tensor.shape()
            ))),
        }
    }

    pub fn to_tensor(&self) -> Result<Tensor<u8>> {
        Tensor::new(
            self.as_bytes().to_vec(),
            vec![self.len(), self.bytes_per_descriptor],
        )
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.bytes_per_descriptor
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes_per_descriptor(&self) -> usize {
        self.bytes_per_descriptor
    }

    pub fn words_per_descriptor(&self) -> usize {
        self.bytes_per_descriptor / WORD_BYTES
    }

    pub fn bits_per_descriptor(&self) -> usize {
        self.bytes_per_descriptor * 8
    }

    pub fn row(&self, i: usize) -> Option<&[u8]> {
        let start = i.checked_mul(self.bytes_per_descriptor)?;
        let end = start.checked_add(self.bytes_per_descriptor)?;
        self.data.get(start..end)
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(self.bytes_per_descriptor)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
