//! Application backend login endpoint.
//!
//! Both provider kinds trade something for the application's own credential
//! at `POST /login/`: the password provider sends a username and password,
//! federated providers send the identity token they obtained.

use crate::config::ApiEndpoint;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Body of a login request.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LoginRequest {
    /// Username/password login
    Password {
        /// Account name
        username: String,
        /// Account password
        password: String,
    },
    /// Federated token exchange
    Federated {
        /// Identity token issued by the federated provider
        token: String,
    },
}

impl LoginRequest {
    /// Label for logs.
    pub fn grant(&self) -> &'static str {
        match self {
            LoginRequest::Password { .. } => "password",
            LoginRequest::Federated { .. } => "federated",
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginRequest::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            LoginRequest::Federated { .. } => f
                .debug_struct("Federated")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Successful login response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Application credential
    pub token: String,

    /// Backend user id
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected user id, got {}",
            other
        ))),
    }
}

/// Backend operations the providers depend on.
#[async_trait]
pub trait BackendAuthApi: Send + Sync {
    /// Exchange credentials for an application token.
    ///
    /// Any non-200 status is `AuthError::LoginRejected`.
    async fn login(&self, request: LoginRequest) -> AuthResult<LoginResponse>;
}

/// `BackendAuthApi` over HTTP.
#[derive(Clone)]
pub struct ReqwestBackend {
    /// HTTP client instance.
    client: Client,

    /// Backend endpoint.
    endpoint: ApiEndpoint,

    /// Login endpoint path.
    login_path: String,
}

impl ReqwestBackend {
    /// Create a backend client.
    pub fn new(endpoint: ApiEndpoint, login_path: impl Into<String>, timeout: Duration) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            login_path: login_path.into(),
        })
    }

    /// Create from the authentication configuration.
    pub fn from_config(config: &crate::config::AuthConfig) -> AuthResult<Self> {
        Self::new(config.api.clone(), config.login_path.clone(), config.timeout())
    }
}

#[async_trait]
impl BackendAuthApi for ReqwestBackend {
    #[instrument(skip(self, request), fields(grant = request.grant()))]
    async fn login(&self, request: LoginRequest) -> AuthResult<LoginResponse> {
        let url = self.endpoint.url(&self.login_path);
        debug!("Posting credentials to {}", url);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if status != reqwest::StatusCode::OK {
            warn!(status = status.as_u16(), "Login rejected by backend");
            return Err(AuthError::LoginRejected {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Internal(format!("Invalid login response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_shapes() {
        let password = LoginRequest::Password {
            username: "ada".to_string(),
            password: "pw".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&password).unwrap(),
            serde_json::json!({"username": "ada", "password": "pw"})
        );

        let federated = LoginRequest::Federated {
            token: "id-token".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&federated).unwrap(),
            serde_json::json!({"token": "id-token"})
        );
    }

    #[test]
    fn test_login_request_debug_redacts() {
        let request = LoginRequest::Password {
            username: "ada".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", request);
        assert!(rendered.contains("ada"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_login_response_numeric_id() {
        let response: LoginResponse =
            serde_json::from_value(serde_json::json!({"token": "t", "id": 42})).unwrap();
        assert_eq!(response.id, "42");
    }
}
