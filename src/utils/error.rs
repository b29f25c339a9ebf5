//! Error types and handling
//!
//! Capture failures, session command failures and the application-wide error
//! type, plus the serialized form handed to the frontend.

use crate::capture::Facing;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure classes reported by the stream provider and the encoder.
///
/// Every variant is recoverable: the session moves to an error status and the
/// user may retry.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum CaptureError {
    #[error("Camera or microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("No capture device found: {0}")]
    DeviceNotFound(String),

    #[error("Capture device is busy: {0}")]
    DeviceBusy(String),

    #[error("Requested capture constraints are not supported: {0}")]
    UnsupportedConstraints(String),

    #[error("Failed to start encoder: {0}")]
    EncoderInitFailed(String),

    #[error("Timed out after {0}ms waiting for the camera stream")]
    StreamTimeout(u64),

    #[error("Capture error: {0}")]
    Unknown(String),
}

impl CaptureError {
    pub fn timeout(after: Duration) -> Self {
        Self::StreamTimeout(after.as_millis() as u64)
    }

    /// Stable code used by the frontend to pick an error message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::DeviceBusy(_) => "DEVICE_BUSY",
            Self::UnsupportedConstraints(_) => "UNSUPPORTED_CONSTRAINTS",
            Self::EncoderInitFailed(_) => "ENCODER_INIT_FAILED",
            Self::StreamTimeout(_) => "STREAM_TIMEOUT",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Errors returned by session manager commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Could not switch to the {requested} camera: {cause}")]
    FlipFailed {
        requested: Facing,
        cause: CaptureError,
    },

    #[error("No segments have been recorded")]
    EmptyLedger,

    #[error("Preview is not active")]
    PreviewInactive,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Capture(err) => err.code(),
            Self::FlipFailed { .. } => "FLIP_FAILED",
            Self::EmptyLedger => "EMPTY_LEDGER",
            Self::PreviewInactive => "PREVIEW_INACTIVE",
        }
    }
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Platform error: {0}")]
    Platform(String),
}

/// Error response for frontend
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Session(err) => err.code(),
            AppError::Platform(_) => "PLATFORM_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<SessionError> for ErrorResponse {
    fn from(error: SessionError) -> Self {
        AppError::Session(error).into()
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_keeps_capture_code() {
        let response: ErrorResponse =
            SessionError::from(CaptureError::DeviceBusy("in use".into())).into();
        assert_eq!(response.code, "DEVICE_BUSY");
        assert!(response.message.contains("in use"));
    }

    #[test]
    fn test_flip_failed_code() {
        let err = SessionError::FlipFailed {
            requested: Facing::Front,
            cause: CaptureError::DeviceNotFound("no front camera".into()),
        };
        let response = ErrorResponse::from(err);
        assert_eq!(response.code, "FLIP_FAILED");
        assert!(response.message.contains("front"));
    }

    #[test]
    fn test_platform_error_code() {
        let response = ErrorResponse::from(AppError::Platform("join failed".into()));
        assert_eq!(response.code, "PLATFORM_ERROR");
        assert_eq!(response.message, "Platform error: join failed");
    }

    #[test]
    fn test_capture_error_serializes_with_kind() {
        let json = serde_json::to_value(CaptureError::timeout(Duration::from_secs(5))).unwrap();
        assert_eq!(json["kind"], "streamTimeout");
        assert_eq!(json["message"], 5000);
    }
}
