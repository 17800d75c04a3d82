//! Observable sign-in state. Created once at startup, mutated only by
//! [`AuthStore::login`], [`AuthStore::register`] and [`AuthStore::logout`].

use std::sync::Arc;

use shared::protocol::{LoginRequest, RegisterRequest};
use tokio::sync::watch;
use tracing::info;

use crate::{api::ReviewApi, error::ClientError};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn {
        access_token: String,
    },
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn { .. })
    }
}

/// Cloning yields another handle onto the same store.
#[derive(Debug, Clone)]
pub struct AuthStore {
    tx: Arc<watch::Sender<AuthState>>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthState::SignedOut);
        Self { tx: Arc::new(tx) }
    }

    /// Starts signed in with a token obtained out of band (config, env).
    pub fn with_token(access_token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(AuthState::SignedIn {
            access_token: access_token.into(),
        });
        store
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        match &*self.tx.borrow() {
            AuthState::SignedIn { access_token } => Some(access_token.clone()),
            AuthState::SignedOut => None,
        }
    }

    pub async fn login(
        &self,
        api: &dyn ReviewApi,
        email: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        require_credentials(email, password)?;
        let response = api
            .login(&LoginRequest {
                email: email.trim().to_string(),
                password: password.to_string(),
            })
            .await?;
        info!("auth: signed in");
        self.set(AuthState::SignedIn {
            access_token: response.access_token,
        });
        Ok(())
    }

    pub async fn register(
        &self,
        api: &dyn ReviewApi,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        if username.trim().is_empty() {
            return Err(ClientError::Validation("username is required".into()));
        }
        require_credentials(email, password)?;
        let response = api
            .register(&RegisterRequest {
                username: username.trim().to_string(),
                email: email.trim().to_string(),
                password: password.to_string(),
            })
            .await?;
        info!("auth: registered and signed in");
        self.set(AuthState::SignedIn {
            access_token: response.access_token,
        });
        Ok(())
    }

    pub fn logout(&self) {
        if self.current().is_signed_in() {
            info!("auth: signed out");
        }
        self.set(AuthState::SignedOut);
    }

    fn set(&self, state: AuthState) {
        self.tx.send_replace(state);
    }
}

fn require_credentials(email: &str, password: &str) -> Result<(), ClientError> {
    if email.trim().is_empty() {
        return Err(ClientError::Validation("email is required".into()));
    }
    if password.is_empty() {
        return Err(ClientError::Validation("password is required".into()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
