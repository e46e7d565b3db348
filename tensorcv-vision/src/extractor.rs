//! FREAK descriptor extractor instances owned by the binding.

use crate::error::VisionError;
use tensorcv_core::FreakParams;

#[cfg(feature = "opencv")]
use opencv::{
    core::{Mat, Ptr, Vector},
    prelude::*,
    xfeatures2d::FREAK,
};
#[cfg(feature = "opencv")]
use tensorcv_core::{DescriptorSet, Keypoint};

/// Bytes in one FREAK descriptor.
pub const FREAK_DESCRIPTOR_BYTES: usize = tensorcv_core::config::FREAK_DESCRIPTOR_PAIRS / 8;

pub struct FreakExtractor {
    params: FreakParams,
    #[cfg(feature = "opencv")]
    inner: Ptr<FREAK>,
}

impl FreakExtractor {
    pub fn new(params: FreakParams) -> Result<Self, VisionError> {
        params.validate()?;
        #[cfg(feature = "opencv")]
        let inner = {
            let pairs: Vector<i32> = params.selected_pairs.iter().copied().collect();
            FREAK::create(
                params.oriented_normalization,
                params.scale_normalization,
                params.pattern_scale,
                params.n_octaves,
                &pairs,
            )?
        };
        Ok(Self {
            params,
            #[cfg(feature = "opencv")]
            inner,
        })
    }

    pub fn params(&self) -> &FreakParams {
        &self.params
    }

    /// Map descriptor bit indices back to pattern pair indices. Only
    /// extractors built from an explicit pair list can do this; the library
    /// default pair list is not exposed, so bit indices are returned as-is.
    pub fn pattern_pairs(&self, bits: &[u32]) -> Vec<i32> {
        if self.params.selected_pairs.is_empty() {
            return bits.iter().map(|&b| b as i32).collect();
        }
        bits.iter()
            .filter_map(|&b| self.params.selected_pairs.get(b as usize).copied())
            .collect()
    }

    /// Describe `keypoints` in a grayscale image. Keypoints too close to the
    /// border are dropped by the library; the survivors are returned with
    /// their descriptors, row for row.
    #[cfg(feature = "opencv")]
    pub fn compute(
        &mut self,
        gray: &Mat,
        keypoints: &[Keypoint],
    ) -> Result<(DescriptorSet, Vec<Keypoint>), VisionError> {
        let mut cv_keypoints = crate::convert::to_cv_keypoints(keypoints)?;
        let mut descriptors = Mat::default();
        self.inner
            .compute(gray, &mut cv_keypoints, &mut descriptors)?;
        let set = crate::convert::descriptor_set(&descriptors, FREAK_DESCRIPTOR_BYTES)?;
        Ok((set, crate::convert::from_cv_keypoints(&cv_keypoints)))
    }
}

impl std::fmt::Debug for FreakExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreakExtractor")
            .field("params", &self.params)
            .finish()
    }
}
