//! Error types for tensorcv-vision

use tensorcv_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("{0} requires the `opencv` feature")]
    Unsupported(&'static str),
}

impl VisionError {
    /// True for failures caused by the caller's input rather than the vision library.
    pub fn is_input_error(&self) -> bool {
        matches!(self, VisionError::Core(_))
    }
}

impl From<VisionError> for CoreError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Core(inner) => inner,
            other => CoreError::Configuration(other.to_string()),
        }
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}
