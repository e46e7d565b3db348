//! Block-grid sampling of dense optical flow.
//!
//! Block-matching flow reports one velocity per block: blocks of
//! `block_size` pixels placed every `shift_size` pixels. Dense flow from the
//! vision library is sampled at the block centres to give the same output
//! geometry, stored as a 2 x rows x cols tensor with the vertical velocity
//! in plane 0 and the horizontal velocity in plane 1.

use crate::config::FlowParams;
use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Number of block rows and columns for an image of `height` x `width`.
pub fn block_grid(height: usize, width: usize, params: &FlowParams) -> Result<(usize, usize)> {
    params.validate()?;
    let block = params.block_size as usize;
    let shift = params.shift_size as usize;
    if height < block || width < block {
        return Err(Error::Shape(format!(
            "image {}x{} is smaller than block size {}",
            height, width, block
        )));
    }
    Ok(((height - block) / shift + 1, (width - block) / shift + 1))
}

/// Sample interleaved `(dx, dy)` dense flow at block centres.
pub fn sample_block_grid(
    dense: &[f32],
    height: usize,
    width: usize,
    params: &FlowParams,
) -> Result<Tensor<f32>> {
    if dense.len() != height * width * 2 {
        return Err(Error::Shape(format!(
            "dense flow has {} values, expected {} for {}x{}x2",
            dense.len(),
            height * width * 2,
            height,
            width
        )));
    }
    let (rows, cols) = block_grid(height, width, params)?;
    let block = params.block_size as usize;
    let shift = params.shift_size as usize;
    let plane = rows * cols;
    let mut out = vec![0f32; plane * 2];
    for r in 0..rows {
        for c in 0..cols {
            let y = r * shift + block / 2;
            let x = c * shift + block / 2;
            let src = (y * width + x) * 2;
            out[r * cols + c] = dense[src + 1];
            out[plane + r * cols + c] = dense[src];
        }
    }
    Tensor::new(out, vec![2, rows, cols])
}

/// Spread a 2 x rows x cols block grid back over every pixel as interleaved
/// `(dx, dy)`; each pixel takes the velocity of the nearest block centre.
pub fn expand_block_grid(
    grid: &Tensor<f32>,
    height: usize,
    width: usize,
    params: &FlowParams,
) -> Result<Vec<f32>> {
    let (rows, cols) = block_grid(height, width, params)?;
    if grid.shape() != [2, rows, cols] {
        return Err(Error::Shape(format!(
            "previous flow must be 2x{}x{}, got {:?}",
            rows,
            cols,
            grid.shape()
        )));
    }
    let half = params.block_size as usize / 2;
    let shift = params.shift_size as usize;
    let nearest = |p: usize, n: usize| ((p.saturating_sub(half) + shift / 2) / shift).min(n - 1);
    let grid = grid.contiguous();
    let values = grid.as_slice().unwrap_or(&[]);
    let plane = rows * cols;
    let mut dense = vec![0f32; height * width * 2];
    for y in 0..height {
        let r = nearest(y, rows);
        for x in 0..width {
            let c = nearest(x, cols);
            let dst = (y * width + x) * 2;
            dense[dst] = values[plane + r * cols + c];
            dense[dst + 1] = values[r * cols + c];
        }
    }
    Ok(dense)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(block: i32, shift: i32) -> FlowParams {
        FlowParams {
            block_size: block,
            shift_size: shift,
            ..FlowParams::default()
        }
    }

    #[test]
    fn test_block_grid_size() {
        assert_eq!(block_grid(10, 20, &params(4, 2)).unwrap(), (4, 9));
        assert_eq!(block_grid(4, 4, &params(4, 1)).unwrap(), (1, 1));
        assert!(block_grid(3, 10, &params(4, 1)).is_err());
    }

    #[test]
    fn test_sample_picks_block_centres() {
        let (h, w) = (4, 4);
        let mut dense = vec![0f32; h * w * 2];
        for y in 0..h {
            for x in 0..w {
                dense[(y * w + x) * 2] = x as f32; // dx
                dense[(y * w + x) * 2 + 1] = 10.0 * y as f32; // dy
            }
        }
        let grid = sample_block_grid(&dense, h, w, &params(2, 2)).unwrap();
        assert_eq!(grid.shape(), &[2, 2, 2]);
        // block (1, 0) centre is at y = 3, x = 1
        assert_eq!(grid.get(&[0, 1, 0]), Some(30.0));
        assert_eq!(grid.get(&[1, 1, 0]), Some(1.0));
    }

    #[test]
    fn test_expand_then_sample_keeps_block_values() {
        let p = params(2, 2);
        let grid = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, -1.0, -2.0, -3.0, -4.0], vec![2, 2, 2]).unwrap();
        let dense = expand_block_grid(&grid, 4, 4, &p).unwrap();
        assert_eq!(dense.len(), 32);
        let back = sample_block_grid(&dense, 4, 4, &p).unwrap();
        assert_eq!(back.to_vec(), grid.to_vec());
    }

    #[test]
    fn test_expand_rejects_wrong_grid() {
        let grid = Tensor::new(vec![0.0; 8], vec![2, 1, 4]).unwrap();
        assert!(expand_block_grid(&grid, 4, 4, &params(2, 2)).is_err());
    }

    #[test]
    fn test_sample_rejects_wrong_buffer() {
        assert!(sample_block_grid(&[0.0; 10], 4, 4, &params(2, 2)).is_err());
    }
}
