//! Strided n-dimensional arrays as handed over by the scripting host.
//!
//! A [`Tensor`] owns (a shared reference to) a flat buffer and describes a
//! view into it through `shape`, `strides` (in elements) and `offset`.
//! `select` and `narrow` produce views over the same buffer; anything that
//! needs row-major memory goes through [`Tensor::contiguous`].

use crate::error::{Error, Result};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Tensor<T> {
    data: Arc<Vec<T>>,
    shape: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
}

/// Row-major strides for `shape`.
pub fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut acc = 1usize;
    for (d, &size) in shape.iter().enumerate().rev() {
        strides[d] = acc;
        acc = acc.saturating_mul(size.max(1));
    }
    strides
}

fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &s| acc.checked_mul(s))
}

impl<T: Copy + Default> Tensor<T> {
    /// Contiguous tensor over `data`; `data.len()` must equal the product of `shape`.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let numel = element_count(&shape)
            .ok_or_else(|| Error::Shape(format!("shape {:?} overflows", shape)))?;
        if numel != data.len() {
            return Err(Error::Shape(format!(
                "shape {:?} needs {} elements, buffer has {}",
                shape,
                numel,
                data.len()
            )));
        }
        let strides = contiguous_strides(&shape);
        Ok(Self {
            data: Arc::new(data),
            shape,
            strides,
            offset: 0,
        })
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Self> {
        let numel = element_count(&shape)
            .ok_or_else(|| Error::Shape(format!("shape {:?} overflows", shape)))?;
        Self::new(vec![T::default(); numel], shape)
    }

    /// Zero-dimensional (empty) tensor.
    pub fn empty() -> Self {
        Self {
            data: Arc::new(Vec::new()),
            shape: Vec::new(),
            strides: Vec::new(),
            offset: 0,
        }
    }

    /// Arbitrary strided view over `data`. Every reachable element must lie
    /// inside the buffer.
    pub fn from_parts(
        data: Vec<T>,
        shape: Vec<usize>,
        strides: Vec<usize>,
        offset: usize,
    ) -> Result<Self> {
        if shape.len() != strides.len() {
            return Err(Error::Shape(format!(
                "{} dimensions but {} strides",
                shape.len(),
                strides.len()
            )));
        }
        if shape.iter().all(|&s| s > 0) && !shape.is_empty() {
            let last = shape
                .iter()
                .zip(&strides)
                .try_fold(offset, |acc, (&size, &stride)| {
                    (size - 1).checked_mul(stride).and_then(|d| acc.checked_add(d))
                })
                .ok_or_else(|| Error::Shape("stride arithmetic overflows".to_string()))?;
            if last >= data.len() {
                return Err(Error::Shape(format!(
                    "view reaches element {} of a {}-element buffer",
                    last,
                    data.len()
                )));
            }
        }
        Ok(Self {
            data: Arc::new(data),
            shape,
            strides,
            offset,
        })
    }

    pub fn dim(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Size of dimension `d`. Panics if `d >= self.dim()`.
    pub fn size(&self, d: usize) -> usize {
        self.shape[d]
    }

    pub fn stride(&self, d: usize) -> usize {
        self.strides[d]
    }

    pub fn numel(&self) -> usize {
        if self.shape.is_empty() {
            0
        } else {
            self.shape.iter().product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// True when the view is laid out row-major without gaps.
    pub fn is_contiguous(&self) -> bool {
        let expected = contiguous_strides(&self.shape);
        self.shape
            .iter()
            .zip(self.strides.iter().zip(&expected))
            .all(|(&size, (&s, &e))| size <= 1 || s == e)
    }

    fn linear_index(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut linear = self.offset;
        for ((&i, &size), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            if i >= size {
                return None;
            }
            linear += i * stride;
        }
        Some(linear)
    }

    pub fn get(&self, index: &[usize]) -> Option<T> {
        self.linear_index(index).and_then(|i| self.data.get(i).copied())
    }

    /// Writes one element. Copies the buffer first if it is shared with another view.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        let i = self.linear_index(index).ok_or_else(|| {
            Error::Shape(format!("index {:?} out of bounds for {:?}", index, self.shape))
        })?;
        let data = Arc::make_mut(&mut self.data);
        data[i] = value;
        Ok(())
    }

    /// Buffer positions of every element in row-major order.
    fn linear_indices(&self) -> Vec<usize> {
        let numel = self.numel();
        let mut out = Vec::with_capacity(numel);
        if numel == 0 {
            return out;
        }
        let mut index = vec![0usize; self.shape.len()];
        let mut linear = self.offset;
        for _ in 0..numel {
            out.push(linear);
            for d in (0..self.shape.len()).rev() {
                index[d] += 1;
                linear += self.strides[d];
                if index[d] < self.shape[d] {
                    break;
                }
                linear -= self.strides[d] * self.shape[d];
                index[d] = 0;
            }
        }
        out
    }

    /// Elements in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        if let Some(slice) = self.as_slice() {
            return slice.to_vec();
        }
        self.linear_indices().into_iter().map(|i| self.data[i]).collect()
    }

    /// Row-major copy of this view, or a cheap clone if it already is one.
    pub fn contiguous(&self) -> Self {
        if self.is_contiguous() && self.offset == 0 && self.data.len() == self.numel() {
            return self.clone();
        }
        let data = self.to_vec();
        Self {
            data: Arc::new(data),
            shape: self.shape.clone(),
            strides: contiguous_strides(&self.shape),
            offset: 0,
        }
    }

    /// Borrow the elements when the view is contiguous.
    pub fn as_slice(&self) -> Option<&[T]> {
        if !self.is_contiguous() {
            return None;
        }
        let numel = self.numel();
        self.data.get(self.offset..self.offset + numel)
    }

    pub fn into_vec(self) -> Vec<T> {
        if self.is_contiguous() && self.offset == 0 && self.data.len() == self.numel() {
            return Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone());
        }
        self.to_vec()
    }

    /// View with dimension `dim` fixed at `index` (one dimension fewer).
    pub fn select(&self, dim: usize, index: usize) -> Result<Self> {
        self.check_dim(dim)?;
        if index >= self.shape[dim] {
            return Err(Error::Shape(format!(
                "select index {} out of range for dimension {} of size {}",
                index, dim, self.shape[dim]
            )));
        }
        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        let offset = self.offset + index * strides[dim];
        shape.remove(dim);
        strides.remove(dim);
        Ok(Self {
            data: Arc::clone(&self.data),
            shape,
            strides,
            offset,
        })
    }

    /// View restricted to `start..start + len` along `dim`.
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Self> {
        self.check_dim(dim)?;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.shape[dim])
            .ok_or_else(|| {
                Error::Shape(format!(
                    "narrow {}..{}+{} out of range for dimension {} of size {}",
                    start, start, len, dim, self.shape[dim]
                ))
            })?;
        let mut shape = self.shape.clone();
        shape[dim] = end - start;
        Ok(Self {
            data: Arc::clone(&self.data),
            shape,
            strides: self.strides.clone(),
            offset: self.offset + start * self.strides[dim],
        })
    }

    fn check_dim(&self, dim: usize) -> Result<()> {
        if dim >= self.shape.len() {
            return Err(Error::Shape(format!(
                "dimension {} out of range for a {}-d tensor",
                dim,
                self.shape.len()
            )));
        }
        Ok(())
    }
}
