use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Error body returned by the collaborator service. FastAPI-style services
/// put the text under `detail` (a string, or a list of validation entries);
/// others use `message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub fn text(&self) -> Option<String> {
        if let Some(detail) = &self.detail {
            return match detail {
                serde_json::Value::String(text) => Some(text.clone()),
                serde_json::Value::Array(entries) => {
                    let joined = entries
                        .iter()
                        .filter_map(|entry| entry.get("msg").and_then(|msg| msg.as_str()))
                        .collect::<Vec<_>>()
                        .join("; ");
                    (!joined.is_empty()).then_some(joined)
                }
                other => Some(other.to_string()),
            };
        }
        self.message.clone().or_else(|| self.error.clone())
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Builds an error from a non-success status and whatever body came with it.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.text())
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    trimmed.to_string()
                }
            });
        Self::new(ErrorCode::from_status(status), message)
    }
}
