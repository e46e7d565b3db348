//! Sparse point tracking between two frames

use crate::error::VisionError;
use opencv::{
    core::{self, Mat, Point2f, Size, TermCriteria, Vector},
    imgproc,
    prelude::*,
    video,
};
use tensorcv_core::{Correspondence, TrackParams};
use tracing::debug;

/// Harris detector free parameter.
const HARRIS_K: f64 = 0.04;

/// Pick corners in `first` and follow them into `second` with pyramidal
/// Lucas-Kanade. Only points the tracker reports as found are returned.
///
/// `first_gray` drives corner selection; the tracker itself runs on the
/// frames as given so colour input keeps its channels.
pub fn track_points(
    first: &Mat,
    first_gray: &Mat,
    second: &Mat,
    params: &TrackParams,
) -> Result<Vec<Correspondence>, VisionError> {
    let mut corners: Vector<Point2f> = Vector::new();
    imgproc::good_features_to_track(
        first_gray,
        &mut corners,
        i32::try_from(params.max_corners).unwrap_or(i32::MAX),
        params.quality_level as f64,
        params.min_distance as f64,
        &Mat::default(),
        params.block_size,
        params.use_harris,
        HARRIS_K,
    )?;
    if corners.is_empty() {
        debug!("no corners to track");
        return Ok(Vec::new());
    }

    let mut tracked: Vector<Point2f> = Vector::new();
    let mut status: Vector<u8> = Vector::new();
    let mut err: Vector<f32> = Vector::new();
    let criteria = TermCriteria::new(
        core::TermCriteria_Type::COUNT as i32 + core::TermCriteria_Type::EPS as i32,
        100,
        0.1,
    )?;
    video::calc_optical_flow_pyr_lk(
        first,
        second,
        &corners,
        &mut tracked,
        &mut status,
        &mut err,
        Size::new(params.win_size, params.win_size),
        params.max_level,
        criteria,
        0,
        0.0,
    )?;

    let points: Vec<Correspondence> = corners
        .iter()
        .zip(tracked.iter())
        .zip(status.iter())
        .filter(|(_, found)| *found != 0)
        .map(|((p1, p2), _)| Correspondence {
            x1: p1.x,
            y1: p1.y,
            x2: p2.x,
            y2: p2.y,
        })
        .collect();
    debug!(corners = corners.len(), tracked = points.len(), "tracked points");
    Ok(points)
}
