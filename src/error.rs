//! Error types for cosecha operations.
//!
//! One crate-wide error enum covering the pipeline taxonomy: fatal fusion
//! errors, per-segment training failures, missing artifacts, and serving-time
//! inference failures.

use std::fmt;

/// Main error type for cosecha operations.
///
/// # Examples
///
/// ```
/// use cosecha::error::CosechaError;
///
/// let err = CosechaError::ArtifactNotFound {
///     segment: "Rice".to_string(),
/// };
/// assert!(err.to_string().contains("Rice"));
/// ```
#[derive(Debug)]
pub enum CosechaError {
    /// Join key mismatch or missing required source column. Fatal: every
    /// segment depends on a correctly fused base.
    Fusion {
        /// What went wrong during the merge
        message: String,
    },

    /// A single segment could not be fitted or evaluated. Isolated: other
    /// segments keep training.
    Training {
        /// Segment key (crop name)
        segment: String,
        /// What went wrong for this segment
        message: String,
    },

    /// No artifact exists for the requested segment key. Client-facing
    /// not-found, never a server fault.
    ArtifactNotFound {
        /// Segment key as requested (before normalization)
        segment: String,
    },

    /// Encoding or model inference failed while serving a request.
    Inference {
        /// Underlying cause, surfaced to the caller
        message: String,
    },

    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for CosechaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CosechaError::Fusion { message } => write!(f, "Fusion failed: {message}"),
            CosechaError::Training { segment, message } => {
                write!(f, "Training failed for segment '{segment}': {message}")
            }
            CosechaError::ArtifactNotFound { segment } => {
                write!(f, "No artifact found for segment '{segment}'")
            }
            CosechaError::Inference { message } => write!(f, "Prediction failed: {message}"),
            CosechaError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {expected}, got {actual}")
            }
            CosechaError::Io(e) => write!(f, "I/O error: {e}"),
            CosechaError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            CosechaError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CosechaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CosechaError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CosechaError {
    fn from(err: std::io::Error) -> Self {
        CosechaError::Io(err)
    }
}

impl From<&str> for CosechaError {
    fn from(msg: &str) -> Self {
        CosechaError::Other(msg.to_string())
    }
}

impl From<String> for CosechaError {
    fn from(msg: String) -> Self {
        CosechaError::Other(msg)
    }
}

impl CosechaError {
    /// Create a fusion error with context.
    #[must_use]
    pub fn fusion(message: impl Into<String>) -> Self {
        Self::Fusion {
            message: message.into(),
        }
    }

    /// Create a per-segment training error.
    #[must_use]
    pub fn training(segment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Training {
            segment: segment.into(),
            message: message.into(),
        }
    }

    /// Create an inference error from any displayable cause.
    #[must_use]
    pub fn inference(cause: impl fmt::Display) -> Self {
        Self::Inference {
            message: cause.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, CosechaError>;
