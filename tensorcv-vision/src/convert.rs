//! Tensor <-> OpenCV Mat conversion

use crate::error::VisionError;
use opencv::{
    core::{self, KeyPoint, Mat, Scalar, Vector},
    imgproc,
    prelude::*,
};
use tensorcv_core::layout::{self, BgrImage, GrayImage};
use tensorcv_core::{DescriptorSet, Keypoint, Tensor};

fn dim(value: usize, what: &str) -> Result<i32, VisionError> {
    i32::try_from(value)
        .map_err(|_| VisionError::Processing(format!("{} {} does not fit an OpenCV Mat", what, value)))
}

fn filled_mat(rows: usize, cols: usize, typ: i32) -> Result<Mat, VisionError> {
    Ok(Mat::new_rows_cols_with_default(
        dim(rows, "rows")?,
        dim(cols, "cols")?,
        typ,
        Scalar::all(0.0),
    )?)
}

/// Deep copy, which OpenCV always lays out continuously.
fn continuous(mat: &Mat) -> Result<Mat, VisionError> {
    Ok(mat.try_clone()?)
}

pub fn bgr_mat(image: &BgrImage) -> Result<Mat, VisionError> {
    let mut mat = filled_mat(image.height, image.width, core::CV_8UC3)?;
    mat.data_bytes_mut()?.copy_from_slice(&image.data);
    Ok(mat)
}

pub fn gray_mat(image: &GrayImage) -> Result<Mat, VisionError> {
    let mut mat = filled_mat(image.height, image.width, core::CV_8UC1)?;
    mat.data_bytes_mut()?.copy_from_slice(&image.data);
    Ok(mat)
}

/// Image tensor as a Mat: HxW stays single channel, 3xHxW / HxWx3 become BGR.
pub fn image_mat(image: &Tensor<u8>) -> Result<Mat, VisionError> {
    if image.dim() == 3 {
        bgr_mat(&layout::to_bgr_image(image)?)
    } else {
        gray_mat(&layout::to_gray_image(image)?)
    }
}

/// Single channel version of a Mat produced by [`image_mat`].
pub fn to_gray(mat: &Mat) -> Result<Mat, VisionError> {
    if mat.channels() == 1 {
        return Ok(mat.try_clone()?);
    }
    let mut gray = Mat::default();
    imgproc::cvt_color(mat, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
    Ok(gray)
}

/// Grayscale Mat straight from an image tensor of either kind.
pub fn gray_image_mat(image: &Tensor<u8>) -> Result<Mat, VisionError> {
    to_gray(&image_mat(image)?)
}

/// Two-channel float Mat from interleaved values.
pub fn float2_mat(height: usize, width: usize, values: &[f32]) -> Result<Mat, VisionError> {
    let mut mat = filled_mat(height, width, core::CV_32FC2)?;
    mat.data_typed_mut::<core::Vec2f>()?
        .iter_mut()
        .zip(values.chunks_exact(2))
        .for_each(|(dst, src)| *dst = core::VecN([src[0], src[1]]));
    Ok(mat)
}

/// Interleaved values of a two-channel float Mat.
pub fn float2_values(mat: &Mat) -> Result<Vec<f32>, VisionError> {
    let mat = continuous(mat)?;
    Ok(mat
        .data_typed::<core::Vec2f>()?
        .iter()
        .flat_map(|v| v.0)
        .collect())
}

pub fn mat_to_bgr(mat: &Mat) -> Result<BgrImage, VisionError> {
    if mat.typ() != core::CV_8UC3 {
        return Err(VisionError::Processing(format!(
            "expected an 8-bit BGR Mat, got type {}",
            mat.typ()
        )));
    }
    let mat = continuous(mat)?;
    Ok(BgrImage {
        height: mat.rows() as usize,
        width: mat.cols() as usize,
        data: mat.data_bytes()?.to_vec(),
    })
}

/// Descriptor rows of an 8-bit Mat; an empty Mat yields an empty set of
/// `fallback_bytes` descriptors.
pub fn descriptor_set(mat: &Mat, fallback_bytes: usize) -> Result<DescriptorSet, VisionError> {
    if mat.rows() == 0 || mat.empty() {
        return Ok(DescriptorSet::empty(fallback_bytes)?);
    }
    let mat = continuous(mat)?;
    Ok(DescriptorSet::new(
        mat.data_bytes()?.to_vec(),
        mat.cols() as usize,
    )?)
}

pub fn to_cv_keypoints(keypoints: &[Keypoint]) -> Result<Vector<KeyPoint>, VisionError> {
    keypoints
        .iter()
        .map(|kp| {
            KeyPoint::new_coords(kp.x, kp.y, kp.size, kp.angle, kp.response, 0, -1)
                .map_err(VisionError::from)
        })
        .collect()
}

pub fn from_cv_keypoints(keypoints: &Vector<KeyPoint>) -> Vec<Keypoint> {
    keypoints
        .iter()
        .map(|kp| Keypoint {
            x: kp.pt().x,
            y: kp.pt().y,
            size: kp.size(),
            angle: kp.angle(),
            response: kp.response(),
        })
        .collect()
}
