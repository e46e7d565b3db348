use crate::error::{Error, Result};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// A detected keypoint in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
}

impl Keypoint {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

/// Columns written per keypoint into a position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionColumns {
    /// x, y, size, angle
    Geometry,
    /// x, y, size, angle, response
    WithResponse,
}

impl PositionColumns {
    pub fn width(self) -> usize {
        match self {
            PositionColumns::Geometry => 4,
            PositionColumns::WithResponse => 5,
        }
    }
}

/// K x 4 or K x 5 float table, one keypoint per row.
pub fn positions_table(keypoints: &[Keypoint], columns: PositionColumns) -> Result<Tensor<f32>> {
    let width = columns.width();
    let mut data = Vec::with_capacity(keypoints.len() * width);
    for kp in keypoints {
        data.extend_from_slice(&[kp.x, kp.y, kp.size, kp.angle]);
        if columns == PositionColumns::WithResponse {
            data.push(kp.response);
        }
    }
    Tensor::new(data, vec![keypoints.len(), width])
}

/// Read keypoints from a K x C table (C >= 2): x, y and, when present,
/// size and angle.
pub fn keypoints_from_positions(positions: &Tensor<f32>) -> Result<Vec<Keypoint>> {
    let (rows, cols) = match positions.shape() {
        [rows, cols] if *cols >= 2 => (*rows, *cols),
        other => {
            return Err(Error::Shape(format!(
                "position table must be K x C with C >= 2, got {:?}",
                other
            )))
        }
    };
    let flat = positions.contiguous().into_vec();
    Ok(flat
        .chunks_exact(cols)
        .take(rows)
        .map(|row| Keypoint {
            size: row.get(2).copied().unwrap_or(0.0),
            angle: row.get(3).copied().unwrap_or(0.0),
            ..Keypoint::at(row[0], row[1])
        })
        .collect())
}

/// One tracked point: position in the first frame and in the second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Correspondence {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// K x 4 table `(x1, y1, x2, y2)`.
pub fn correspondence_table(points: &[Correspondence]) -> Result<Tensor<f32>> {
    let data = points
        .iter()
        .flat_map(|c| [c.x1, c.y1, c.x2, c.y2])
        .collect();
    Tensor::new(data, vec![points.len(), 4])
}
