//! Error handling for the pressure polling service
//!
//! Per-tick protocol failures are not errors here: they are
//! [`ValidationOutcome`](press_protocol::ValidationOutcome) values that end
//! up in the record store. Only what stops a run, or what a caller must see,
//! is modelled below.

use thiserror::Error;

use crate::sink::SinkError;
use crate::transport::TransportError;

/// Service error type
#[derive(Error, Debug, Clone)]
pub enum PressSrvError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serial port open/write failures (fatal to the current run)
    #[error("Port error: {0}")]
    PortError(#[from] TransportError),

    /// Record store failures
    #[error("Sink error: {0}")]
    SinkError(#[from] SinkError),

    /// Scheduler used in the wrong state
    #[error("State error: {0}")]
    StateError(String),

    /// Internal errors (task join failures)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the service
pub type Result<T> = std::result::Result<T, PressSrvError>;

impl PressSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        PressSrvError::ConfigError(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        PressSrvError::StateError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PressSrvError::InternalError(msg.into())
    }

    /// Whether the error ends a polling run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PressSrvError::PortError(_) | PressSrvError::InternalError(_)
        )
    }
}

impl From<figment::Error> for PressSrvError {
    fn from(err: figment::Error) -> Self {
        PressSrvError::ConfigError(format!("Failed to parse config: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PressSrvError::config("baud_rate must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: baud_rate must be greater than zero"
        );

        let err: PressSrvError = TransportError::OpenFailed("/dev/ttyUSB9: not found".into()).into();
        assert!(err.to_string().starts_with("Port error: "));
        assert!(err.to_string().contains("/dev/ttyUSB9"));
    }

    #[test]
    fn test_fatal_classification() {
        let port: PressSrvError = TransportError::WriteFailed("broken pipe".into()).into();
        assert!(port.is_fatal());

        let sink: PressSrvError = SinkError::Io("disk full".into()).into();
        assert!(!sink.is_fatal());

        assert!(!PressSrvError::state("already running").is_fatal());
    }
}
