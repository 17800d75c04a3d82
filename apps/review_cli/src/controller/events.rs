//! Failure modeling for terminal output.

use std::fmt;

use review_client::{ClientError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

impl FailureCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Transport => "transport",
            Self::Validation => "validation",
            Self::Unknown => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CliFailure {
    category: FailureCategory,
    message: String,
}

impl CliFailure {
    pub fn from_client_error(err: &ClientError) -> Self {
        let category = match err {
            ClientError::Unauthorized(_) => FailureCategory::Auth,
            // A missing document or patient is almost always a mistyped id.
            ClientError::NotFound(_) => FailureCategory::Validation,
            other => match other.kind() {
                ErrorKind::Transport => FailureCategory::Transport,
                ErrorKind::Validation | ErrorKind::NotFound => FailureCategory::Validation,
            },
        };
        Self {
            category,
            message: err.to_string(),
        }
    }

    /// Classifies an error chain, preferring a [`ClientError`] anywhere in it.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(client) = err.chain().find_map(|cause| cause.downcast_ref::<ClientError>()) {
            let mut failure = Self::from_client_error(client);
            failure.message = format!("{err:#}");
            return failure;
        }
        Self {
            category: FailureCategory::Unknown,
            message: format!("{err:#}"),
        }
    }

    pub fn category(&self) -> FailureCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == FailureCategory::Auth
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self.category {
            FailureCategory::Auth => {
                Some("sign in with `review login` and set APP__ACCESS_TOKEN or --token")
            }
            FailureCategory::Transport => {
                Some("server unreachable or failing; check --server-url and retry")
            }
            FailureCategory::Validation | FailureCategory::Unknown => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.category {
            FailureCategory::Validation => 2,
            FailureCategory::Auth => 3,
            FailureCategory::Transport => 4,
            FailureCategory::Unknown => 1,
        }
    }
}

impl fmt::Display for CliFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category.label(), self.message)?;
        if let Some(hint) = self.hint() {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}
