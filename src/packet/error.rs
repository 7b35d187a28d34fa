//! Error types for the Packet backend.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors raised by the Packet backend.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PacketBackendError {
    /// Raised when the backend cannot be constructed from configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a request is missing a required field.
    #[error("invalid device request: {0}")]
    Validation(String),
    /// Raised when the HTTP exchange itself fails.
    #[error("{action} failed: {message}")]
    Transport {
        /// Operation being attempted (for example `create project`).
        action: String,
        /// Message returned by the HTTP client.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("{action} returned {status}: {reason}")]
    Api {
        /// Operation being attempted.
        action: String,
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        reason: String,
        /// Response body, kept for diagnostics.
        body: String,
    },
    /// Raised when a success response cannot be decoded.
    #[error("failed to decode {action} response: {message}")]
    Decode {
        /// Operation being attempted.
        action: String,
        /// Decoder error message.
        message: String,
    },
}

impl PacketBackendError {
    /// Returns the HTTP status and reason when the API rejected a request.
    #[must_use]
    pub fn status_line(&self) -> Option<String> {
        match self {
            Self::Api { status, reason, .. } => Some(format!("{status}: {reason}")),
            _ => None,
        }
    }
}

impl From<BackendError> for PacketBackendError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Validation(field) => Self::Validation(field),
        }
    }
}
