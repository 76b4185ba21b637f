//! Error handling for Samplecraft
//!
//! Every editing error is returned synchronously to the caller. Requests are
//! never silently downgraded: an out-of-range crossfade is an error, not a
//! clamp.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::SampleId;

/// Result type alias for Samplecraft operations
pub type Result<T> = std::result::Result<T, SampleError>;

/// Main error type for Samplecraft operations
#[derive(Error, Debug)]
pub enum SampleError {
    // Region Errors
    #[error("Invalid range: {reason}")]
    InvalidRange { reason: String },

    #[error("Invalid crossfade of {crossfade_frames} frames: {reason}")]
    InvalidCrossfade {
        crossfade_frames: usize,
        reason: String,
    },

    // Format Errors
    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Sample contains no frames")]
    EmptySample,

    // Request Errors
    #[error("Invalid edit request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Store Errors
    #[error("Sample not found: {id}")]
    SampleNotFound { id: SampleId },

    #[error("Sample {id} is already being edited")]
    SampleBusy { id: SampleId },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Save worker has stopped")]
    SaveWorkerStopped,

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SampleError {
    /// Build an I/O error bound to the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SampleError::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SampleError::InvalidRange { .. } => "INVALID_RANGE",
            SampleError::InvalidCrossfade { .. } => "INVALID_CROSSFADE",
            SampleError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            SampleError::InvalidAudio { .. } => "INVALID_AUDIO",
            SampleError::EmptySample => "EMPTY_SAMPLE",
            SampleError::InvalidRequest { .. } => "INVALID_REQUEST",
            SampleError::InvalidConfig { .. } => "INVALID_CONFIG",
            SampleError::SampleNotFound { .. } => "SAMPLE_NOT_FOUND",
            SampleError::SampleBusy { .. } => "SAMPLE_BUSY",
            SampleError::FileNotFound { .. } => "FILE_NOT_FOUND",
            SampleError::Io { .. } => "IO_ERROR",
            SampleError::Cancelled { .. } => "CANCELLED",
            SampleError::SaveWorkerStopped => "SAVE_WORKER_STOPPED",
            SampleError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable by changing the request and retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SampleError::InvalidRange { .. }
                | SampleError::InvalidCrossfade { .. }
                | SampleError::InvalidRequest { .. }
                | SampleError::SampleBusy { .. }
                | SampleError::Cancelled { .. }
                | SampleError::FileNotFound { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SampleError::InvalidRange { .. } => vec![
                "Make sure the start position is before the end position",
                "Keep the end position within the sample length",
            ],
            SampleError::InvalidCrossfade { .. } => vec![
                "Use a shorter crossfade",
                "Widen the loop region",
                "Move the loop start later so there is material before it",
            ],
            SampleError::UnsupportedFormat { .. } => vec![
                "Convert the file to WAV first",
                "Supported bit depths: 8, 16, 24, 32-bit integer and 32-bit float",
            ],
            SampleError::SampleBusy { .. } => {
                vec!["Wait for the running edit on this sample to finish"]
            }
            SampleError::Io { .. } => vec![
                "Check that the destination directory exists and is writable",
                "Free up disk space",
            ],
            SampleError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = SampleError::InvalidRange {
            reason: "start >= end".to_string(),
        };
        assert_eq!(err.error_code(), "INVALID_RANGE");

        let err = SampleError::Cancelled {
            operation: "save".to_string(),
        };
        assert_eq!(err.error_code(), "CANCELLED");
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = SampleError::InvalidCrossfade {
            crossfade_frames: 4000,
            reason: "exceeds region length 1000".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("4000"));
    }

    #[test]
    fn test_io_error_is_not_recoverable() {
        let err = SampleError::io(
            "/tmp/out.wav",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("/tmp/out.wav"));
    }
}
