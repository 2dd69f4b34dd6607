//! Username/password provider.

use crate::backend::{BackendAuthApi, LoginRequest};
use crate::claims::{Credential, RefreshedToken};
use crate::config::ProviderKind;
use crate::error::{AuthError, AuthResult};
use crate::provider::AuthProvider;
use crate::session::SessionStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Provider that exchanges a username and password with the backend.
pub struct PasswordAuthProvider {
    session: Arc<SessionStore>,
    backend: Arc<dyn BackendAuthApi>,
}

impl std::fmt::Debug for PasswordAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuthProvider")
            .field("authenticated", &self.session.is_authenticated())
            .finish()
    }
}

impl PasswordAuthProvider {
    /// Create a password provider.
    pub fn new(session: Arc<SessionStore>, backend: Arc<dyn BackendAuthApi>) -> Self {
        Self { session, backend }
    }
}

#[async_trait]
impl AuthProvider for PasswordAuthProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Password
    }

    #[instrument(skip(self, password))]
    async fn login(&self, username: Option<&str>, password: Option<&str>) -> AuthResult<bool> {
        let (Some(username), Some(password)) = (username, password) else {
            warn!("Password login needs both username and password");
            return Ok(false);
        };

        let request = LoginRequest::Password {
            username: username.to_string(),
            password: password.to_string(),
        };

        match self.backend.login(request).await {
            Ok(response) => {
                self.session.install(
                    Credential::from_token(response.token),
                    Some(response.id),
                    ProviderKind::Password,
                );
                info!("Password login succeeded");
                Ok(true)
            }
            Err(AuthError::LoginRejected { status }) => {
                warn!(status, "Password login rejected");
                self.session.clear();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn logout(&self) {
        self.session.clear();
    }

    fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    fn get_token(&self) -> Option<String> {
        self.session.token()
    }

    fn get_user_id(&self) -> Option<String> {
        self.session.user_id()
    }

    async fn refresh_token(&self) -> AuthResult<Option<RefreshedToken>> {
        Err(AuthError::RefreshUnsupported)
    }

    fn supports_refresh(&self) -> bool {
        false
    }
}
