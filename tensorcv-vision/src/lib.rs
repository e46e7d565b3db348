//! tensorcv-vision: host bindings over the vision library
//!
//! Exposes point tracking, dense flow, FAST keypoints, FREAK descriptors,
//! image remapping and binary descriptor matching to a tensor-based host.
//! Image operations need the `opencv` feature; descriptor matching and
//! extractor handles work in every build.

pub mod binding;
pub mod error;
pub mod extractor;
pub mod host;

#[cfg(feature = "opencv")]
pub mod convert;
#[cfg(feature = "opencv")]
pub mod processing;

pub use binding::Binding;
pub use error::VisionError;
pub use extractor::{FreakExtractor, FREAK_DESCRIPTOR_BYTES};
pub use host::HostFunction;
