//! Error types for backend requests

use console_auth::AuthError;
use thiserror::Error;

/// Backend request errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request never got a response.
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend rejected the credential; the session has been purged.
    #[error("Session expired")]
    Unauthorized,

    /// The expired credential could not be renewed. The session is purged
    /// when the cause ends it.
    #[error("Token refresh failed: {0}")]
    Refresh(#[source] AuthError),

    /// The response could not be turned into the requested shape.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// The client could not be built.
    #[error("Client configuration error: {0}")]
    Config(String),
}

/// Result type for backend requests.
pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    /// Get error code for logs and UI messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            HttpError::Network(_) => "NETWORK_ERROR",
            HttpError::Unauthorized => "UNAUTHORIZED",
            HttpError::Refresh(_) => "REFRESH_FAILURE",
            HttpError::InvalidResponse(_) => "INVALID_RESPONSE",
            HttpError::Config(_) => "CONFIG_ERROR",
        }
    }
}
