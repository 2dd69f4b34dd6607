//! Error types for authentication operations
//!
//! This module defines the errors raised while decoding credentials,
//! talking to identity providers, refreshing tokens and exchanging
//! federated tokens with the application backend.

use thiserror::Error;

/// Authentication error types.
///
/// The type is `Clone` because the outcome of a shared refresh attempt is
/// handed to every caller awaiting it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Identity SDK setup failed for one provider
    #[error("Provider initialization failed: {0}")]
    InitializationFailure(String),

    /// Credential could not be decoded
    #[error("Could not decode token: {0}")]
    DecodeFailure(String),

    /// Provider has no refresh capability
    #[error("Token refresh is not supported by this provider")]
    RefreshUnsupported,

    /// No session to refresh, or the identity SDK rejected the attempt
    #[error("Token refresh failed: {0}")]
    RefreshFailure(String),

    /// Federated token rejected by the application backend
    #[error("Backend token exchange failed with status {status}")]
    BackendExchangeFailure {
        /// HTTP status returned by the login endpoint.
        status: u16,
    },

    /// Login endpoint returned a non-success status
    #[error("Login rejected with status {status}")]
    LoginRejected {
        /// HTTP status returned by the login endpoint.
        status: u16,
    },

    /// Backend answered 401 on an authenticated call
    #[error("Unauthorized")]
    Unauthorized,

    /// Identity provider returned an error on the redirect callback
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    /// Transport-level failure talking to the backend
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Rejected logins and unsupported refreshes are expected and
    /// should not be logged as errors.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::Internal(_) | AuthError::ConfigError(_) | AuthError::InitializationFailure(_)
        )
    }

    /// Whether the session can no longer be trusted after this error.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            AuthError::Unauthorized
                | AuthError::RefreshFailure(_)
                | AuthError::BackendExchangeFailure { .. }
        )
    }

    /// Get error code for logs and UI messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InitializationFailure(_) => "INITIALIZATION_FAILURE",
            AuthError::DecodeFailure(_) => "DECODE_FAILURE",
            AuthError::RefreshUnsupported => "REFRESH_UNSUPPORTED",
            AuthError::RefreshFailure(_) => "REFRESH_FAILURE",
            AuthError::BackendExchangeFailure { .. } => "BACKEND_EXCHANGE_FAILURE",
            AuthError::LoginRejected { .. } => "LOGIN_REJECTED",
            AuthError::Unauthorized => "UNAUTHORIZED",
            AuthError::IdentityProvider(_) => "IDENTITY_PROVIDER_ERROR",
            AuthError::Network(_) => "NETWORK_ERROR",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::RefreshUnsupported.error_code(), "REFRESH_UNSUPPORTED");
        assert_eq!(
            AuthError::BackendExchangeFailure { status: 403 }.error_code(),
            "BACKEND_EXCHANGE_FAILURE"
        );
    }

    #[test]
    fn test_session_ending_errors() {
        assert!(AuthError::Unauthorized.ends_session());
        assert!(AuthError::RefreshFailure("no account".to_string()).ends_session());
        assert!(!AuthError::RefreshUnsupported.ends_session());
        assert!(!AuthError::Network("reset".to_string()).ends_session());
    }

    #[test]
    fn test_server_errors() {
        assert!(AuthError::InitializationFailure("bad authority".to_string()).is_server_error());
        assert!(!AuthError::LoginRejected { status: 401 }.is_server_error());
    }
}
