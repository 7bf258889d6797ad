//! Error types for the motion bridge.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StrideError>;

/// Unified error type.
///
/// Permission and availability errors are surfaced to the caller as-is and
/// never retried by the bridge.
#[derive(Debug, Error)]
pub enum StrideError {
    /// The user has not granted location permission.
    #[error("location permission denied")]
    PermissionDenied,

    /// No provider has a fix to report.
    #[error("no location available")]
    LocationUnavailable,

    /// The OS refused access at call time despite an earlier permission check.
    #[error("security error: {0}")]
    SecurityError(String),

    /// A control surface received a command it does not know.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The sensor backing a stream is missing.
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// A biometric prompt is already waiting for the user.
    #[error("an authentication request is already pending")]
    AuthenticationInProgress,

    /// The processing task or its queue has gone away.
    #[error("stream closed")]
    StreamClosed,

    /// Configuration values are out of range.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON payload could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StrideError {
    /// Error code reported on the platform channel.
    pub fn code(&self) -> &'static str {
        match self {
            StrideError::PermissionDenied => "PERMISSION_DENIED",
            StrideError::LocationUnavailable => "NO_LOCATION",
            StrideError::SecurityError(_) => "SECURITY_ERROR",
            StrideError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            StrideError::SensorUnavailable(_) => "SENSOR_UNAVAILABLE",
            StrideError::AuthenticationInProgress => "AUTH_IN_PROGRESS",
            StrideError::StreamClosed => "STREAM_CLOSED",
            StrideError::Config(_) | StrideError::Toml(_) => "CONFIG_ERROR",
            StrideError::Io(_) => "IO_ERROR",
            StrideError::Json(_) => "INVALID_ARGUMENT",
        }
    }
}
