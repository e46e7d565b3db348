//! Tensor to image/matrix layout rules.
//!
//! Host images arrive either planar (3xHxW) or interleaved (HxWx3) in RGB
//! order, as bytes or as normalised floats. The vision library wants
//! interleaved BGR bytes. Everything here is plain memory shuffling; colour
//! conversions beyond channel reordering belong to the vision library.

use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Where the colour channels live in a 3-d image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorLayout {
    /// 3 x H x W
    Planar,
    /// H x W x 3
    Interleaved,
}

impl ColorLayout {
    /// Detect the layout from a shape, returning it with (height, width).
    /// A leading dimension of 3 wins when both interpretations fit.
    pub fn detect(shape: &[usize]) -> Result<(Self, usize, usize)> {
        match shape {
            [3, h, w] => Ok((ColorLayout::Planar, *h, *w)),
            [h, w, 3] => Ok((ColorLayout::Interleaved, *h, *w)),
            _ => Err(Error::Shape(format!(
                "colour image must be 3xHxW or HxWx3, got {:?}",
                shape
            ))),
        }
    }
}

/// Scalar types that can be turned into an 8-bit pixel.
pub trait PixelValue: Copy + Default {
    fn to_pixel(self) -> u8;
}

impl PixelValue for u8 {
    #[inline]
    fn to_pixel(self) -> u8 {
        self
    }
}

impl PixelValue for f32 {
    #[inline]
    fn to_pixel(self) -> u8 {
        (self * 255.0).clamp(0.0, 255.0) as u8
    }
}

impl PixelValue for f64 {
    #[inline]
    fn to_pixel(self) -> u8 {
        (self * 255.0).clamp(0.0, 255.0) as u8
    }
}

/// Interleaved 8-bit BGR image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrImage {
    pub height: usize,
    pub width: usize,
    pub data: Vec<u8>,
}

impl BgrImage {
    /// (b, g, r) at row `y`, column `x`.
    pub fn pixel(&self, y: usize, x: usize) -> Option<[u8; 3]> {
        if y >= self.height || x >= self.width {
            return None;
        }
        let i = (y * self.width + x) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }
}

/// Single channel 8-bit image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    pub height: usize,
    pub width: usize,
    pub data: Vec<u8>,
}

/// Convert an RGB image tensor (either layout) into interleaved BGR bytes.
/// Float inputs are scaled by 255 and clamped.
pub fn to_bgr_image<T: PixelValue>(tensor: &Tensor<T>) -> Result<BgrImage> {
    let (layout, height, width) = ColorLayout::detect(tensor.shape())?;
    let mut data = Vec::with_capacity(height * width * 3);
    for y in 0..height {
        for x in 0..width {
            for c in [2usize, 1, 0] {
                let index = match layout {
                    ColorLayout::Planar => [c, y, x],
                    ColorLayout::Interleaved => [y, x, c],
                };
                let value = tensor.get(&index).ok_or_else(|| {
                    Error::Shape(format!("pixel {:?} outside image", index))
                })?;
                data.push(value.to_pixel());
            }
        }
    }
    Ok(BgrImage { height, width, data })
}

/// Planar 3xHxW tensor from an interleaved BGR image (RGB channel order restored).
pub fn bgr_to_planar(image: &BgrImage) -> Result<Tensor<u8>> {
    let plane = image.height * image.width;
    let mut data = vec![0u8; plane * 3];
    for (p, bgr) in image.data.chunks_exact(3).enumerate() {
        data[p] = bgr[2];
        data[plane + p] = bgr[1];
        data[2 * plane + p] = bgr[0];
    }
    Tensor::new(data, vec![3, image.height, image.width])
}

/// A 2-d byte tensor as a grayscale image.
pub fn to_gray_image(tensor: &Tensor<u8>) -> Result<GrayImage> {
    match tensor.shape() {
        [h, w] => Ok(GrayImage {
            height: *h,
            width: *w,
            data: tensor.contiguous().into_vec(),
        }),
        other => Err(Error::Shape(format!(
            "grayscale image must be HxW, got {:?}",
            other
        ))),
    }
}

/// Interleave a 2 x H x W tensor into H x W pairs `(plane0, plane1)`, the
/// layout of a two-channel float map. Returns `(height, width, values)`.
pub fn interleave_planes(planes: &Tensor<f32>) -> Result<(usize, usize, Vec<f32>)> {
    let (height, width) = match planes.shape() {
        [2, h, w] => (*h, *w),
        other => {
            return Err(Error::Shape(format!(
                "two-plane map must be 2xHxW, got {:?}",
                other
            )))
        }
    };
    let first = planes.select(0, 0)?.to_vec();
    let second = planes.select(0, 1)?.to_vec();
    let values = first
        .into_iter()
        .zip(second)
        .flat_map(|(a, b)| [a, b])
        .collect();
    Ok((height, width, values))
}

/// How a tensor maps onto a dense matrix header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatLayout {
    Empty,
    /// 1-d tensor seen as a single column.
    Column { rows: usize },
    /// 2-d single channel matrix.
    Matrix { rows: usize, cols: usize },
    /// 3-d tensor whose last dimension (2 or 3) becomes the channel count.
    MultiChannel { rows: usize, cols: usize, channels: usize },
    /// Anything else, kept n-dimensional.
    Dense { sizes: Vec<usize> },
}

/// A tensor paired with the matrix layout it should be viewed as.
/// The tensor is always contiguous so the layout can be applied to its
/// buffer directly.
#[derive(Debug, Clone)]
pub struct MatrixView<T> {
    pub layout: MatLayout,
    pub tensor: Tensor<T>,
}

impl<T: Copy + Default> MatrixView<T> {
    pub fn new(tensor: &Tensor<T>) -> Self {
        let layout = match tensor.shape() {
            [] => MatLayout::Empty,
            [rows] => MatLayout::Column { rows: *rows },
            [rows, cols] => MatLayout::Matrix {
                rows: *rows,
                cols: *cols,
            },
            [rows, cols, channels] if *channels == 2 || *channels == 3 => {
                MatLayout::MultiChannel {
                    rows: *rows,
                    cols: *cols,
                    channels: *channels,
                }
            }
            sizes => MatLayout::Dense {
                sizes: sizes.to_vec(),
            },
        };
        Self {
            layout,
            tensor: tensor.contiguous(),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        self.tensor.as_slice().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_layout() {
        assert_eq!(
            ColorLayout::detect(&[3, 4, 5]).unwrap(),
            (ColorLayout::Planar, 4, 5)
        );
        assert_eq!(
            ColorLayout::detect(&[4, 5, 3]).unwrap(),
            (ColorLayout::Interleaved, 4, 5)
        );
        assert_eq!(
            ColorLayout::detect(&[3, 2, 3]).unwrap().0,
            ColorLayout::Planar
        );
        assert!(ColorLayout::detect(&[4, 5]).is_err());
        assert!(ColorLayout::detect(&[4, 5, 4]).is_err());
    }

    #[test]
    fn test_planar_bytes_to_bgr() {
        // one pixel: r=10, g=20, b=30
        let t = Tensor::new(vec![10u8, 20, 30], vec![3, 1, 1]).unwrap();
        let img = to_bgr_image(&t).unwrap();
        assert_eq!(img.pixel(0, 0), Some([30, 20, 10]));
    }

    #[test]
    fn test_interleaved_floats_are_scaled_and_clamped() {
        let t = Tensor::new(vec![1.0f32, 0.5, -0.2, 2.0, 0.0, 0.0], vec![1, 2, 3]).unwrap();
        let img = to_bgr_image(&t).unwrap();
        assert_eq!(img.pixel(0, 0), Some([0, 127, 255]));
        assert_eq!(img.pixel(0, 1), Some([0, 0, 255]));
    }

    #[test]
    fn test_strided_input_is_read_correctly() {
        // interleaved 1x2x3 stored with padding between pixels
        let data = vec![1u8, 2, 3, 0, 4, 5, 6, 0];
        let t = Tensor::from_parts(data, vec![1, 2, 3], vec![8, 4, 1], 0).unwrap();
        let img = to_bgr_image(&t).unwrap();
        assert_eq!(img.data, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_bgr_to_planar_restores_rgb() {
        let t = Tensor::new(vec![1u8, 2, 3, 4, 5, 6], vec![3, 1, 2]).unwrap();
        let img = to_bgr_image(&t).unwrap();
        let back = bgr_to_planar(&img).unwrap();
        assert_eq!(back.to_vec(), t.to_vec());
    }

    #[test]
    fn test_interleave_planes() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0], vec![2, 1, 3]).unwrap();
        let (h, w, v) = interleave_planes(&t).unwrap();
        assert_eq!((h, w), (1, 3));
        assert_eq!(v, vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);
        let bad = Tensor::new(vec![0.0; 6], vec![3, 1, 2]).unwrap();
        assert!(interleave_planes(&bad).is_err());
    }

    #[test]
    fn test_gray_image_requires_2d() {
        let t = Tensor::new(vec![0u8; 6], vec![2, 3]).unwrap();
        let g = to_gray_image(&t).unwrap();
        assert_eq!((g.height, g.width), (2, 3));
        let t3 = Tensor::new(vec![0u8; 6], vec![1, 2, 3]).unwrap();
        assert!(to_gray_image(&t3).is_err());
    }

    #[test]
    fn test_matrix_view_layouts() {
        let t: Tensor<f32> = Tensor::empty();
        assert_eq!(MatrixView::new(&t).layout, MatLayout::Empty);

        let t = Tensor::new(vec![0f32; 4], vec![4]).unwrap();
        assert_eq!(MatrixView::new(&t).layout, MatLayout::Column { rows: 4 });

        let t = Tensor::new(vec![0f32; 12], vec![2, 3, 2]).unwrap();
        assert_eq!(
            MatrixView::new(&t).layout,
            MatLayout::MultiChannel { rows: 2, cols: 3, channels: 2 }
        );

        let t = Tensor::new(vec![0f32; 16], vec![2, 2, 4]).unwrap();
        assert_eq!(
            MatrixView::new(&t).layout,
            MatLayout::Dense { sizes: vec![2, 2, 4] }
        );
    }

    #[test]
    fn test_matrix_view_makes_strided_input_contiguous() {
        let t = Tensor::from_parts((0..6).collect::<Vec<i32>>(), vec![3, 2], vec![1, 3], 0).unwrap();
        let view = MatrixView::new(&t);
        assert_eq!(view.layout, MatLayout::Matrix { rows: 3, cols: 2 });
        assert_eq!(view.as_slice(), &[0, 3, 1, 4, 2, 5]);
    }
}
