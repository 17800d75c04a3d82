//! Error taxonomy shared by every controller in this crate.

use std::time::Duration;

use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Coarse class of a failure, used by views to decide how to present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, timeout, auth or server failure. Surfaced as a visible failure state.
    Transport,
    /// The resource does not exist (yet). Benign for optional sub-resources.
    NotFound,
    /// Rejected locally before any network call was made.
    Validation,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("{0}")]
    Validation(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) | Self::InvalidState(_) => ErrorKind::Validation,
            Self::Transport(_)
            | Self::Timeout(_)
            | Self::Unauthorized(_)
            | Self::Server { .. }
            | Self::Decode(_) => ErrorKind::Transport,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let api = ApiError::from_response(status, body);
        match api.code {
            ErrorCode::NotFound => Self::NotFound(api.message),
            ErrorCode::Unauthorized | ErrorCode::Forbidden => Self::Unauthorized(api.message),
            _ => Self::Server {
                status,
                message: api.message,
            },
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
