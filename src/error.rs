//! Error types for the form scoring library.

use crate::landmarks::BodyPart;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// A landmark required for scoring is absent from the pose
    #[error("Missing landmark {part:?} (index {index}, pose has {len} landmarks)")]
    MissingLandmark {
        /// Body part that was requested
        part: BodyPart,
        /// Index of the body part in the landmark list
        index: usize,
        /// Number of landmarks actually supplied
        len: usize,
    },

    /// A landmark carries non-finite coordinates
    #[error("Invalid landmark: {0}")]
    InvalidLandmark(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filter initialization or processing error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Alert delivery failed
    #[error("Alert dispatch error: {0}")]
    AlertDispatch(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame or report (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
