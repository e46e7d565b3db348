//! Dense optical flow on a block grid

use crate::convert;
use crate::error::VisionError;
use opencv::{core::Mat, prelude::*, video};
use tensorcv_core::flow::{expand_block_grid, sample_block_grid};
use tensorcv_core::{FlowParams, Tensor};
use tracing::debug;

const PYRAMID_SCALE: f64 = 0.5;
const ITERATIONS: i32 = 3;
const POLY_N: i32 = 5;
const POLY_SIGMA: f64 = 1.1;

/// Flow from `first` to `second` (both single channel, same size), returned
/// as a 2 x rows x cols block grid with vertical velocity in plane 0.
///
/// With `use_previous` set and a `previous` grid supplied, the estimate
/// starts from that grid instead of zero.
pub fn dense_flow(
    first: &Mat,
    second: &Mat,
    params: &FlowParams,
    previous: Option<&Tensor<f32>>,
) -> Result<Tensor<f32>, VisionError> {
    let height = first.rows() as usize;
    let width = first.cols() as usize;
    let mut flags = 0;
    let mut flow = match previous {
        Some(grid) if params.use_previous => {
            flags |= video::OPTFLOW_USE_INITIAL_FLOW;
            let dense = expand_block_grid(grid, height, width, params)?;
            convert::float2_mat(height, width, &dense)?
        }
        _ => Mat::default(),
    };

    let levels = params.pyramid_levels();
    video::calc_optical_flow_farneback(
        first,
        second,
        &mut flow,
        PYRAMID_SCALE,
        levels,
        params.block_size.max(POLY_N),
        ITERATIONS,
        POLY_N,
        POLY_SIGMA,
        flags,
    )?;
    debug!(height, width, levels, "computed dense flow");

    let dense = convert::float2_values(&flow)?;
    Ok(sample_block_grid(&dense, height, width, params)?)
}
