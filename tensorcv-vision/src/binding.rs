//! Host-facing operations.
//!
//! [`Binding`] is what a host runtime talks to: tensors in, tensors out,
//! extractor instances behind integer handles. Every operation checks its
//! inputs first, so shape and handle errors are reported the same way with
//! or without the vision library compiled in.

use crate::error::VisionError;
use crate::extractor::FreakExtractor;
use crate::host::HostFunction;
use tensorcv_core::keypoint;
#[cfg(feature = "opencv")]
use tensorcv_core::keypoint::PositionColumns;
use tensorcv_core::descriptor::WORD_BYTES;
use tensorcv_core::layout::ColorLayout;
use tensorcv_core::matcher::threshold_from_host;
use tensorcv_core::{
    BinaryMatcher, BindingConfig, DescriptorSet, Error as CoreError, FastParams, FlowParams,
    FreakParams, Handle, HandleRegistry, Interpolation, MatchReport, Tensor, TrackParams,
    TrainParams,
};
use tracing::{debug, info};

#[cfg(feature = "opencv")]
use crate::{convert, processing};
#[cfg(feature = "opencv")]
use tensorcv_core::{layout, select_pairs, Keypoint};

type Result<T> = std::result::Result<T, VisionError>;

pub struct Binding {
    config: BindingConfig,
    matcher: BinaryMatcher,
    freaks: HandleRegistry<FreakExtractor>,
}

impl Binding {
    pub fn new(config: BindingConfig) -> Result<Self> {
        config.validate()?;
        let matcher = BinaryMatcher::new(config.matcher.options());
        debug!(matcher = ?config.matcher, "binding ready");
        Ok(Self {
            config,
            matcher,
            freaks: HandleRegistry::new("freak"),
        })
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Match two N x D descriptor tables. Rows of `descs1` are paired with
    /// their nearest row of `descs2` when the Hamming distance is below
    /// `threshold`.
    pub fn match_freak(
        &self,
        descs1: &Tensor<u8>,
        descs2: &Tensor<u8>,
        threshold: i64,
    ) -> Result<MatchReport> {
        let threshold = threshold_from_host(threshold)?;
        let (query, train) = descriptor_inputs(descs1, descs2)?;
        Ok(self.matcher.run(&query, &train, threshold)?)
    }

    /// Build an extractor and hand back its handle.
    pub fn create_freak(&self, params: FreakParams) -> Result<Handle> {
        let trained = !params.selected_pairs.is_empty();
        let handle = self.freaks.insert(FreakExtractor::new(params)?)?;
        info!(%handle, trained, "created FREAK extractor");
        Ok(handle)
    }

    /// Extractor built from the configured defaults.
    pub fn create_default_freak(&self) -> Result<Handle> {
        self.create_freak(self.config.freak.clone())
    }

    pub fn delete_freak(&self, handle: Handle) -> Result<()> {
        self.freaks.remove(handle)?;
        info!(%handle, "deleted FREAK extractor");
        Ok(())
    }

    pub fn freak_count(&self) -> usize {
        self.freaks.len()
    }

    pub fn freak_params(&self, handle: Handle) -> Result<FreakParams> {
        Ok(self.freaks.with(handle, |f| f.params().clone())?)
    }

    /// Corners of `im1` followed into `im2`, as a K x 4 table
    /// `(x1, y1, x2, y2)`.
    pub fn track_points(
        &self,
        im1: &Tensor<u8>,
        im2: &Tensor<u8>,
        params: &TrackParams,
    ) -> Result<Tensor<f32>> {
        params.validate()?;
        check_image(im1)?;
        check_same_shape(im1, im2)?;
        #[cfg(feature = "opencv")]
        {
            let first = convert::image_mat(im1)?;
            let second = convert::image_mat(im2)?;
            let first_gray = convert::to_gray(&first)?;
            let points = processing::track_points(&first, &first_gray, &second, params)?;
            Ok(keypoint::correspondence_table(&points)?)
        }
        #[cfg(not(feature = "opencv"))]
        {
            Err(VisionError::Unsupported(HostFunction::TrackPoints.name()))
        }
    }

    /// Dense flow between two frames on the block grid described by
    /// `params`: 2 x rows x cols, vertical velocity first.
    pub fn dense_optical_flow(
        &self,
        im1: &Tensor<u8>,
        im2: &Tensor<u8>,
        params: &FlowParams,
        previous: Option<&Tensor<f32>>,
    ) -> Result<Tensor<f32>> {
        check_image(im1)?;
        check_same_shape(im1, im2)?;
        let (height, width) = image_size(im1)?;
        tensorcv_core::flow::block_grid(height, width, params)?;
        #[cfg(feature = "opencv")]
        {
            let first = convert::gray_image_mat(im1)?;
            let second = convert::gray_image_mat(im2)?;
            processing::dense_flow(&first, &second, params, previous)
        }
        #[cfg(not(feature = "opencv"))]
        {
            let _ = previous;
            Err(VisionError::Unsupported(
                HostFunction::DenseOpticalFlow.name(),
            ))
        }
    }

    /// FAST keypoints as a K x 5 table `(x, y, size, angle, response)`.
    pub fn compute_fast(&self, im: &Tensor<u8>, threshold: f32) -> Result<Tensor<f32>> {
        let params = self.fast_params(threshold)?;
        check_image(im)?;
        #[cfg(feature = "opencv")]
        {
            let gray = convert::gray_image_mat(im)?;
            let keypoints = processing::detect_fast(&gray, &params)?;
            debug!(keypoints = keypoints.len(), "detected FAST keypoints");
            Ok(keypoint::positions_table(
                &keypoints,
                PositionColumns::WithResponse,
            )?)
        }
        #[cfg(not(feature = "opencv"))]
        {
            let _ = params;
            Err(VisionError::Unsupported(HostFunction::ComputeFAST.name()))
        }
    }

    /// FAST keypoints described with the extractor behind `handle`. Returns
    /// the K x D descriptors and the K x 4 positions `(x, y, size, angle)`
    /// of the keypoints that could be described.
    pub fn compute_freak(
        &self,
        im: &Tensor<u8>,
        threshold: f32,
        handle: Handle,
    ) -> Result<(Tensor<u8>, Tensor<f32>)> {
        let params = self.fast_params(threshold)?;
        check_image(im)?;
        self.check_handle(handle)?;
        #[cfg(feature = "opencv")]
        {
            let gray = convert::gray_image_mat(im)?;
            let keypoints = processing::detect_fast(&gray, &params)?;
            let (descriptors, kept) = self.describe(handle, &gray, &keypoints)?;
            debug!(
                detected = keypoints.len(),
                described = kept.len(),
                "computed FREAK descriptors"
            );
            Ok((
                descriptors.to_tensor()?,
                keypoint::positions_table(&kept, PositionColumns::Geometry)?,
            ))
        }
        #[cfg(not(feature = "opencv"))]
        {
            let _ = params;
            Err(VisionError::Unsupported(HostFunction::ComputeFREAK.name()))
        }
    }

    /// Descriptors for caller supplied points, a K x C table (C >= 2) of
    /// `x, y` and optionally `size, angle`.
    pub fn compute_freak_from_keypoints(
        &self,
        im: &Tensor<u8>,
        positions: &Tensor<f32>,
        handle: Handle,
    ) -> Result<Tensor<u8>> {
        check_image(im)?;
        let keypoints = keypoint::keypoints_from_positions(positions)?;
        if keypoints.is_empty() {
            return Err(CoreError::EmptyInput("no keypoint positions".to_string()).into());
        }
        self.check_handle(handle)?;
        #[cfg(feature = "opencv")]
        {
            let gray = convert::gray_image_mat(im)?;
            let (descriptors, _) = self.describe(handle, &gray, &keypoints)?;
            Ok(descriptors.to_tensor()?)
        }
        #[cfg(not(feature = "opencv"))]
        {
            Err(VisionError::Unsupported(
                HostFunction::ComputeFREAKfromKeyPoints.name(),
            ))
        }
    }

    /// Learn a pair list from a set of training images. The result can be
    /// passed back as `FreakParams::selected_pairs` once it holds a full
    /// descriptor's worth of pairs.
    pub fn train_freak(
        &self,
        images: &[Tensor<u8>],
        handle: Handle,
        params: &TrainParams,
    ) -> Result<Tensor<i32>> {
        params.validate()?;
        if images.is_empty() {
            return Err(CoreError::EmptyInput("no training images".to_string()).into());
        }
        for im in images {
            check_image(im)?;
        }
        self.check_handle(handle)?;
        #[cfg(feature = "opencv")]
        {
            let mut sets = Vec::with_capacity(images.len());
            for im in images {
                let gray = convert::gray_image_mat(im)?;
                let keypoints = processing::detect_fast(&gray, &params.fast)?;
                let (descriptors, _) = self.describe(handle, &gray, &keypoints)?;
                sets.push(descriptors);
            }
            let bits = select_pairs(&sets, params.corr_threshold, params.max_pairs)?;
            let pairs = self.freaks.with(handle, |f| f.pattern_pairs(&bits))?;
            info!(
                images = images.len(),
                pairs = pairs.len(),
                "trained FREAK pairs"
            );
            let len = pairs.len();
            Ok(Tensor::new(pairs, vec![len])?)
        }
        #[cfg(not(feature = "opencv"))]
        {
            Err(VisionError::Unsupported(HostFunction::TrainFREAK.name()))
        }
    }

    /// Warp a colour image through a 2 x H x W coordinate map (plane 0 = x,
    /// plane 1 = y). The result is planar 3 x H x W.
    pub fn remap(
        &self,
        src: &Tensor<u8>,
        map: &Tensor<f32>,
        mode: Interpolation,
    ) -> Result<Tensor<u8>> {
        ColorLayout::detect(src.shape())?;
        match map.shape() {
            [2, _, _] => {}
            other => {
                return Err(CoreError::Shape(format!(
                    "remap coordinates must be 2xHxW, got {:?}",
                    other
                ))
                .into())
            }
        }
        #[cfg(feature = "opencv")]
        {
            let image = layout::to_bgr_image(src)?;
            let warped = processing::remap_image(&image, map, mode)?;
            Ok(layout::bgr_to_planar(&warped)?)
        }
        #[cfg(not(feature = "opencv"))]
        {
            let _ = mode;
            Err(VisionError::Unsupported(HostFunction::Remap.name()))
        }
    }

    /// Remap with the interpolation given by name (`INTER_LINEAR`,
    /// `INTER_CUBIC`).
    pub fn remap_named(
        &self,
        src: &Tensor<u8>,
        map: &Tensor<f32>,
        mode: &str,
    ) -> Result<Tensor<u8>> {
        let mode: Interpolation = mode.parse()?;
        self.remap(src, map, mode)
    }

    /// Version of the linked vision library.
    pub fn version(&self) -> String {
        #[cfg(feature = "opencv")]
        {
            opencv::core::get_version_string().unwrap_or_else(|_| "unknown".to_string())
        }
        #[cfg(not(feature = "opencv"))]
        {
            "unavailable".to_string()
        }
    }

    fn fast_params(&self, threshold: f32) -> Result<FastParams> {
        let params = self.config.fast.with_threshold(threshold);
        params.validate()?;
        Ok(params)
    }

    fn check_handle(&self, handle: Handle) -> Result<()> {
        Ok(self.freaks.with(handle, |_| ())?)
    }

    #[cfg(feature = "opencv")]
    fn describe(
        &self,
        handle: Handle,
        gray: &opencv::core::Mat,
        keypoints: &[Keypoint],
    ) -> Result<(DescriptorSet, Vec<Keypoint>)> {
        self.freaks
            .with_mut(handle, |f| f.compute(gray, keypoints))?
    }
}

impl Default for Binding {
    fn default() -> Self {
        Self {
            config: BindingConfig::default(),
            matcher: BinaryMatcher::default(),
            freaks: HandleRegistry::new("freak"),
        }
    }
}

fn has_no_rows(descs: &Tensor<u8>) -> bool {
    descs.shape().first().map_or(true, |&rows| rows == 0)
}

/// Row width an N x D table declares, if any.
fn declared_width(descs: &Tensor<u8>) -> Option<usize> {
    match descs.shape() {
        [_, cols] if *cols > 0 => Some(*cols),
        _ => None,
    }
}

fn descriptor_set(descs: &Tensor<u8>, fallback: Option<usize>) -> Result<DescriptorSet> {
    if !has_no_rows(descs) {
        return Ok(DescriptorSet::from_tensor(descs)?);
    }
    let width = declared_width(descs).or(fallback).unwrap_or(WORD_BYTES);
    Ok(DescriptorSet::empty(width)?)
}

/// Descriptor sets for a match call. A table with no rows keeps the width
/// it declares, so length and dimension checks still apply to it; only a
/// table without a width (0-d, or zero columns) takes the other side's.
fn descriptor_inputs(
    descs1: &Tensor<u8>,
    descs2: &Tensor<u8>,
) -> Result<(DescriptorSet, DescriptorSet)> {
    let query = descriptor_set(descs1, declared_width(descs2))?;
    let train = descriptor_set(descs2, Some(query.bytes_per_descriptor()))?;
    Ok((query, train))
}

fn image_size(im: &Tensor<u8>) -> Result<(usize, usize)> {
    match im.shape() {
        [h, w] => Ok((*h, *w)),
        shape => {
            let (_, h, w) = ColorLayout::detect(shape)?;
            Ok((h, w))
        }
    }
}

/// Images are H x W grayscale or 3 x H x W / H x W x 3 colour.
fn check_image(im: &Tensor<u8>) -> Result<()> {
    let (h, w) = image_size(im)?;
    if h == 0 || w == 0 {
        return Err(CoreError::EmptyInput(format!("image of shape {:?}", im.shape())).into());
    }
    Ok(())
}

fn check_same_shape(im1: &Tensor<u8>, im2: &Tensor<u8>) -> Result<()> {
    if im1.shape() != im2.shape() {
        return Err(CoreError::Shape(format!(
            "frames differ in shape: {:?} vs {:?}",
            im1.shape(),
            im2.shape()
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size() {
        let gray = Tensor::<u8>::zeros(vec![4, 6]).unwrap();
        assert_eq!(image_size(&gray).unwrap(), (4, 6));
        let planar = Tensor::<u8>::zeros(vec![3, 4, 6]).unwrap();
        assert_eq!(image_size(&planar).unwrap(), (4, 6));
        let bad = Tensor::<u8>::zeros(vec![2, 4, 6]).unwrap();
        assert!(image_size(&bad).is_err());
    }

    #[test]
    fn test_empty_image_rejected() {
        let empty = Tensor::<u8>::zeros(vec![0, 6]).unwrap();
        assert!(matches!(
            check_image(&empty),
            Err(VisionError::Core(CoreError::EmptyInput(_)))
        ));
    }

    #[test]
    fn test_descriptor_inputs_borrow_width() {
        let rows = Tensor::new(vec![0u8; 16], vec![1, 16]).unwrap();
        let none: Tensor<u8> = Tensor::empty();
        let (q, t) = descriptor_inputs(&none, &rows).unwrap();
        assert_eq!(q.len(), 0);
        assert_eq!(q.bytes_per_descriptor(), 16);
        assert_eq!(t.len(), 1);

        let (q, t) = descriptor_inputs(&rows, &none).unwrap();
        assert_eq!((q.len(), t.len()), (1, 0));
        assert_eq!(t.bytes_per_descriptor(), 16);

        let (q, t) = descriptor_inputs(&none, &none).unwrap();
        assert_eq!(q.bytes_per_descriptor(), WORD_BYTES);
        assert_eq!(t.bytes_per_descriptor(), WORD_BYTES);
    }

    #[test]
    fn test_descriptor_inputs_keep_declared_width() {
        let rows = Tensor::new(vec![0u8; 16], vec![2, 8]).unwrap();
        let wide = Tensor::<u8>::zeros(vec![0, 16]).unwrap();
        let (q, t) = descriptor_inputs(&rows, &wide).unwrap();
        assert_eq!(q.bytes_per_descriptor(), 8);
        assert_eq!(t.bytes_per_descriptor(), 16);

        let unaligned = Tensor::<u8>::zeros(vec![0, 12]).unwrap();
        assert!(matches!(
            descriptor_inputs(&unaligned, &rows),
            Err(VisionError::Core(CoreError::InvalidDescriptorLength(12)))
        ));

        let no_cols = Tensor::<u8>::zeros(vec![0, 0]).unwrap();
        let (q, _) = descriptor_inputs(&no_cols, &rows).unwrap();
        assert_eq!(q.bytes_per_descriptor(), 8);
    }

    #[test]
    fn test_fast_threshold_bounds() {
        let binding = Binding::default();
        assert!(binding.fast_params(20.0).is_ok());
        assert!(binding.fast_params(300.0).is_err());
        assert_eq!(binding.fast_params(7.9).unwrap().threshold, 7);
        assert_eq!(
            binding.fast_params(7.9).unwrap().nonmax_suppression,
            binding.config().fast.nonmax_suppression
        );
    }
}
