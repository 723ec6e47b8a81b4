use thiserror::Error;

/// Fallback text shown when the backend gives no usable message.
pub const GENERIC_EXCHANGE_MESSAGE: &str = "Sign-in could not be completed. Please try again.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid callback: {0}")]
    InvalidCallback(String),
    #[error("authentication exchange failed: {0}")]
    Exchange(String),
    #[error("a login is already in progress")]
    LoginInProgress,
    #[error("login cancelled")]
    Cancelled,
}

impl AuthError {
    /// Builds an exchange error, substituting the generic message for blank input.
    pub fn exchange(message: impl Into<String>) -> Self {
        let message = message.into();
        let trimmed = message.trim();
        if trimmed.is_empty() {
            Self::Exchange(GENERIC_EXCHANGE_MESSAGE.to_string())
        } else {
            Self::Exchange(trimmed.to_string())
        }
    }

    /// Human-readable text for the redirect entry point to display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCallback(message) => {
                format!("The sign-in link is invalid or has already been used ({message}).")
            }
            Self::Exchange(message) => message.clone(),
            Self::LoginInProgress => "A sign-in is already in progress.".to_string(),
            Self::Cancelled => "Sign-in was cancelled.".to_string(),
        }
    }
}

/// Error raised by an identity backend implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected(message) => Self::exchange(message),
            other => Self::exchange(other.to_string()),
        }
    }
}
