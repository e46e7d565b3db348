//! FAST corner detection

use crate::convert;
use crate::error::VisionError;
use opencv::{
    core::{KeyPoint, Mat, Vector},
    features2d,
};
use tensorcv_core::{FastParams, Keypoint};

pub fn detect_fast(gray: &Mat, params: &FastParams) -> Result<Vec<Keypoint>, VisionError> {
    params.validate()?;
    let mut keypoints: Vector<KeyPoint> = Vector::new();
    features2d::fast(gray, &mut keypoints, params.threshold, params.nonmax_suppression)?;
    Ok(convert::from_cv_keypoints(&keypoints))
}
