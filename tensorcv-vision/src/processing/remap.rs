//! Image warping through a per-pixel coordinate map

use crate::convert;
use crate::error::VisionError;
use opencv::{
    core::{self, Mat, Scalar},
    imgproc,
};
use tensorcv_core::layout::{self, BgrImage};
use tensorcv_core::{Interpolation, Tensor};

fn interpolation_flag(mode: Interpolation) -> i32 {
    match mode {
        Interpolation::Linear => imgproc::INTER_LINEAR,
        Interpolation::Cubic => imgproc::INTER_CUBIC,
    }
}

/// Sample `src` at the coordinates in `map` (2 x H x W, plane 0 = x,
/// plane 1 = y). Pixels mapped outside the source are black. The map sets
/// the output size.
pub fn remap_image(
    src: &BgrImage,
    map: &Tensor<f32>,
    mode: Interpolation,
) -> Result<BgrImage, VisionError> {
    let (height, width, coords) = layout::interleave_planes(map)?;
    let src = convert::bgr_mat(src)?;
    let map = convert::float2_mat(height, width, &coords)?;
    let mut dst = Mat::default();
    imgproc::remap(
        &src,
        &mut dst,
        &map,
        &Mat::default(),
        interpolation_flag(mode),
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )?;
    convert::mat_to_bgr(&dst)
}
