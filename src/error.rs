//! Error handling for Sonoscape
//!
//! Pipeline-level failures abort and surface a single error to the caller.
//! Per-source problems (an unreadable asset, an empty timeline) are not
//! errors; they travel as warnings in the render report.

use thiserror::Error;

/// Result type alias for Sonoscape operations
pub type Result<T> = std::result::Result<T, SonoscapeError>;

/// Main error type for Sonoscape operations
#[derive(Error, Debug)]
pub enum SonoscapeError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio data: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Source Errors
    #[error("Failed to decode audio for source {source_id}: {reason}")]
    DecodeFailure {
        source_id: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Parameter Errors
    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Pipeline Errors
    #[error("Render failed: {reason}")]
    RenderFailure { reason: String },

    #[error("WAV encoding failed: {reason}")]
    EncodeFailure { reason: String },

    #[error("Render cancelled")]
    Cancelled,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SonoscapeError {
    /// Shorthand for an `InvalidParameter` error
    pub fn invalid_parameter(
        param: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        SonoscapeError::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SonoscapeError::FileNotFound { .. } => "FILE_NOT_FOUND",
            SonoscapeError::InvalidAudio { .. } => "INVALID_AUDIO",
            SonoscapeError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            SonoscapeError::DecodeFailure { .. } => "DECODE_FAILURE",
            SonoscapeError::InvalidParameter { .. } => "INVALID_PARAMETER",
            SonoscapeError::RenderFailure { .. } => "RENDER_FAILURE",
            SonoscapeError::EncodeFailure { .. } => "ENCODE_FAILURE",
            SonoscapeError::Cancelled => "CANCELLED",
            SonoscapeError::Io(_) => "IO_ERROR",
            SonoscapeError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable without aborting an export
    ///
    /// Asset-level failures are: the offending source is skipped and the
    /// remaining sources still render.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SonoscapeError::DecodeFailure { .. }
                | SonoscapeError::FileNotFound { .. }
                | SonoscapeError::InvalidAudio { .. }
                | SonoscapeError::UnsupportedFormat { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SonoscapeError::FileNotFound { .. } => vec![
                "Check the asset path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            SonoscapeError::DecodeFailure { .. }
            | SonoscapeError::InvalidAudio { .. }
            | SonoscapeError::UnsupportedFormat { .. } => {
                vec![
                    "Convert the asset to a 16/24/32-bit WAV file",
                    "The source was skipped; the rest of the scene still exported",
                ]
            }
            SonoscapeError::InvalidParameter { .. } => vec![
                "Supported sample rates: 44100, 48000, 88200, 96000",
                "Supported bit depths: 16, 24, 32",
            ],
            SonoscapeError::RenderFailure { .. } => vec![
                "Try a shorter timeline or a lower sample rate",
                "No file was written",
            ],
            SonoscapeError::Cancelled => vec!["Start the export again when ready"],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = SonoscapeError::FileNotFound {
            path: "test.wav".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(SonoscapeError::Cancelled.error_code(), "CANCELLED");
    }

    #[test]
    fn test_decode_failure_is_recoverable() {
        let err = SonoscapeError::DecodeFailure {
            source_id: "abc".to_string(),
            reason: "truncated header".to_string(),
            source: None,
        };
        assert!(err.is_recoverable());
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_pipeline_failures_are_fatal() {
        let render = SonoscapeError::RenderFailure {
            reason: "boom".to_string(),
        };
        let encode = SonoscapeError::EncodeFailure {
            reason: "ragged channels".to_string(),
        };
        assert!(!render.is_recoverable());
        assert!(!encode.is_recoverable());
        assert!(!SonoscapeError::Cancelled.is_recoverable());
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = SonoscapeError::invalid_parameter("sample_rate", 22050, "44100|48000|88200|96000");
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert!(err.to_string().contains("22050"));
    }
}
