use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid descriptor length: {0} bytes (must be a positive multiple of 8)")]
    InvalidDescriptorLength(usize),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid threshold: {0} (must be non-negative)")]
    InvalidThreshold(i64),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidDescriptorLength(12);
        assert!(err.to_string().contains("12 bytes"));

        let err = Error::DimensionMismatch { expected: 64, actual: 32 };
        assert!(err.to_string().contains("expected 64"));
        assert!(err.to_string().contains("got 32"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }
}
