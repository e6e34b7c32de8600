//! Error types and handling
//!
//! Command misuse errors returned by the session controller, and the
//! serialisable response shape hosts use to render any session failure.

use crate::capture::{AcquisitionError, SourceError};
use crate::recorder::state::{RecordingStatus, SessionCommand};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A command was issued that the session cannot honour in its current state
///
/// These signal caller misuse. They are returned immediately and never stored
/// in the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot {command}: no active capture")]
    NoActiveCapture { command: SessionCommand },

    #[error("Cannot {command} while {status}")]
    InvalidTransition {
        command: SessionCommand,
        status: RecordingStatus,
    },

    /// The environment recorder rejected the command; session state is unchanged
    #[error("Recorder rejected {command}: {source}")]
    Recorder {
        command: SessionCommand,
        #[source]
        source: SourceError,
    },
}

/// Error response for hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&SessionError> for ErrorResponse {
    fn from(error: &SessionError) -> Self {
        let code = match error {
            SessionError::NoActiveCapture { .. } => "NO_ACTIVE_CAPTURE",
            SessionError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SessionError::Recorder { .. } => "RECORDER_FAILED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<&AcquisitionError> for ErrorResponse {
    fn from(error: &AcquisitionError) -> Self {
        let code = match error {
            AcquisitionError::UserCancelled => "USER_CANCELLED",
            AcquisitionError::AcquisitionFailed { .. } => "ACQUISITION_FAILED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;
