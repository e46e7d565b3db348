//! Core types for the tensorcv binding: strided host tensors, descriptor
//! sets, the brute-force Hamming matcher, descriptor pair selection, the
//! handle registry for stateful extractors and per-operation configuration.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod flow;
pub mod keypoint;
pub mod layout;
pub mod matcher;
pub mod pairs;
pub mod registry;
pub mod tensor;

pub use config::{
    BindingConfig, FastParams, FlowParams, FreakParams, Interpolation, MatchParams, TrackParams,
    TrainParams,
};
pub use descriptor::DescriptorSet;
pub use error::{Error, Result};
pub use keypoint::{Correspondence, Keypoint, PositionColumns};
pub use layout::{BgrImage, ColorLayout, GrayImage, MatLayout, MatrixView};
pub use matcher::{
    hamming_distance, match_descriptors, BinaryMatcher, MatchOptions, MatchPair, MatchReport,
    SearchRange,
};
pub use pairs::select_pairs;
pub use registry::{Handle, HandleRegistry};
pub use tensor::Tensor;
