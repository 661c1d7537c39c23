//! Error types for armlink.

use thiserror::Error;

/// Main error type for armlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote actuator service never produced a valid session.
    #[error("Connection failed after {attempts} attempts: {reason}")]
    Connection {
        /// Number of acquisition attempts made
        attempts: u32,
        /// Outcome of the last attempt
        reason: String,
    },

    /// Calibration geometry is insufficient
    #[error("Validation error: {0}")]
    Validation(String),

    /// Camera read failed; the caller may retry after a short delay
    #[error("Transient capture error: {0}")]
    TransientCapture(String),

    /// Command send failed; effect on the actuator is unknown
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Malformed request to the gateway
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Camera device could not be opened
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Hardware is not initialized yet
    #[error("Hardware not ready")]
    NotReady,

    /// Operator aborted an interactive procedure
    #[error("Cancelled by operator")]
    Cancelled,

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Decision collaborator failure
    #[error("Decision error: {0}")]
    Decision(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Image decode/encode errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the failed operation may be attempted again.
    ///
    /// Connection errors are only retryable inside the acquisition loop;
    /// once surfaced with an attempt count they are fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransientCapture(_) | Error::Dispatch(_) | Error::Http(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_carries_attempts() {
        let err = Error::Connection {
            attempts: 5,
            reason: "resource id 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Connection failed after 5 attempts: resource id 0"
        );
    }

    #[test]
    fn test_validation_error() {
        let err = Error::Validation("pixel displacement 3.0 < 5".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: pixel displacement 3.0 < 5"
        );
    }

    #[test]
    fn test_not_ready_error() {
        assert_eq!(Error::NotReady.to_string(), "Hardware not ready");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::TransientCapture("no frame".to_string()).is_retryable());
        assert!(Error::Dispatch("timeout".to_string()).is_retryable());
        assert!(!Error::Validation("x".to_string()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::Connection {
            attempts: 5,
            reason: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
