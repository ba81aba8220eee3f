//! Error types for DJV.

use thiserror::Error;

/// Main error type for DJV operations.
///
/// The frame cache itself never fails; these errors come from the
/// collaborators that feed it (loaders, decode workers, the application).
#[derive(Error, Debug)]
pub enum DjvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for DJV operations.
pub type Result<T> = std::result::Result<T, DjvError>;
