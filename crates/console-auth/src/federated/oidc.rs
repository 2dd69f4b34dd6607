//! Identity SDK adapter built on `openidconnect`.
//!
//! Implements the authorization-code flow with PKCE for a public client.
//! Flow state (CSRF state, nonce, PKCE verifier) and tokens are kept in the
//! session storage under the SDK's own key prefix, so a page reload between
//! redirect and callback does not lose them.

use super::sdk::{IdentitySdk, IdentitySdkBuilder, OidcSettings, ProviderResponse, RedirectCallback};
use crate::codec;
use crate::config::{AuthConfig, ProviderKind};
use crate::error::{AuthError, AuthResult};
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::reqwest::async_http_client;
use openidconnect::{
    AuthorizationCode, ClientId, CsrfToken, IssuerUrl, Nonce, OAuth2TokenResponse,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse,
};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument, warn};

const STATE_KEY: &str = "state";
const NONCE_KEY: &str = "nonce";
const VERIFIER_KEY: &str = "pkce_verifier";
const ID_TOKEN_KEY: &str = "id_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// OpenID-Connect SDK for one directory.
pub struct OidcSdk {
    settings: OidcSettings,
    storage: Arc<dyn KeyValueStore>,
    client: OnceLock<CoreClient>,
}

impl std::fmt::Debug for OidcSdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcSdk")
            .field("kind", &self.settings.kind)
            .field("issuer", &self.settings.issuer)
            .field("discovered", &self.client.get().is_some())
            .finish()
    }
}

impl OidcSdk {
    /// Create an SDK; discovery is deferred to [`IdentitySdk::initialize`].
    pub fn new(settings: OidcSettings, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            settings,
            storage,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> AuthResult<&CoreClient> {
        self.client
            .get()
            .ok_or_else(|| AuthError::InitializationFailure("Identity SDK not initialized".to_string()))
    }

    fn get(&self, name: &str) -> Option<String> {
        self.storage.get(&self.settings.storage_key(name))
    }

    fn set(&self, name: &str, value: &str) {
        self.storage.set(&self.settings.storage_key(name), value);
    }

    fn take(&self, name: &str) -> Option<String> {
        let key = self.settings.storage_key(name);
        let value = self.storage.get(&key);
        self.storage.remove(&key);
        value
    }

    fn remember_tokens(&self, id_token: &str, refresh_token: Option<&RefreshToken>) {
        self.set(ID_TOKEN_KEY, id_token);
        if let Some(refresh_token) = refresh_token {
            self.set(REFRESH_TOKEN_KEY, refresh_token.secret());
        }
    }

    async fn refresh_with(&self, refresh_token: String) -> AuthResult<ProviderResponse> {
        let client = self.client()?;
        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("Refresh grant failed: {}", e)))?;

        let id_token = response
            .id_token()
            .ok_or_else(|| AuthError::IdentityProvider("Refresh response has no id_token".to_string()))?;

        // Renewed identity tokens carry no nonce.
        id_token
            .claims(&client.id_token_verifier(), |_: Option<&Nonce>| -> Result<(), String> { Ok(()) })
            .map_err(|e| AuthError::IdentityProvider(format!("Invalid id_token: {}", e)))?;

        let raw = id_token.to_string();
        self.remember_tokens(&raw, response.refresh_token());
        Ok(ProviderResponse::new(raw))
    }
}

#[async_trait]
impl IdentitySdk for OidcSdk {
    #[instrument(skip(self), fields(issuer = %self.settings.issuer))]
    async fn initialize(&self) -> AuthResult<()> {
        if self.client.get().is_some() {
            return Ok(());
        }

        let issuer = IssuerUrl::new(self.settings.issuer.clone())
            .map_err(|e| AuthError::InitializationFailure(format!("Invalid issuer: {}", e)))?;
        let redirect = RedirectUrl::new(self.settings.redirect_uri.clone())
            .map_err(|e| AuthError::InitializationFailure(format!("Invalid redirect URI: {}", e)))?;

        let metadata = CoreProviderMetadata::discover_async(issuer, async_http_client)
            .await
            .map_err(|e| AuthError::InitializationFailure(format!("Discovery failed: {}", e)))?;

        let client = CoreClient::from_provider_metadata(
            metadata,
            ClientId::new(self.settings.client_id.clone()),
            None,
        )
        .set_redirect_uri(redirect);

        let _ = self.client.set(client);
        debug!("Provider metadata discovered");
        Ok(())
    }

    async fn begin_redirect_login(&self) -> AuthResult<String> {
        let client = self.client()?;
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(challenge);
        for scope in &self.settings.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, state, nonce) = request.url();

        self.set(STATE_KEY, state.secret());
        self.set(NONCE_KEY, nonce.secret());
        self.set(VERIFIER_KEY, verifier.secret());

        Ok(url.to_string())
    }

    #[instrument(skip(self, callback))]
    async fn complete_redirect(&self, callback: &RedirectCallback) -> AuthResult<Option<ProviderResponse>> {
        let Some(code) = callback.code.clone() else {
            return Ok(None);
        };

        let expected_state = self.take(STATE_KEY);
        let nonce = self.take(NONCE_KEY);
        let verifier = self.take(VERIFIER_KEY);

        let (Some(expected_state), Some(nonce), Some(verifier)) = (expected_state, nonce, verifier) else {
            warn!("Callback received without a pending login");
            return Ok(None);
        };
        if callback.state.as_deref() != Some(expected_state.as_str()) {
            return Err(AuthError::IdentityProvider("State mismatch in redirect callback".to_string()));
        }

        let client = self.client()?;
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::IdentityProvider(format!("Code exchange failed: {}", e)))?;

        let id_token = response
            .id_token()
            .ok_or_else(|| AuthError::IdentityProvider("Token response has no id_token".to_string()))?;
        id_token
            .claims(&client.id_token_verifier(), &Nonce::new(nonce))
            .map_err(|e| AuthError::IdentityProvider(format!("Invalid id_token: {}", e)))?;

        let raw = id_token.to_string();
        self.remember_tokens(&raw, response.refresh_token());
        info!(provider = %self.settings.kind, "Authorization code redeemed");
        Ok(Some(ProviderResponse::new(raw)))
    }

    async fn acquire_token_silent(&self, force_refresh: bool) -> AuthResult<Option<ProviderResponse>> {
        if !force_refresh {
            if let Some(cached) = self.get(ID_TOKEN_KEY) {
                if !codec::is_expired(&cached, codec::DEFAULT_EXPIRY_BUFFER) {
                    return Ok(Some(ProviderResponse::new(cached)));
                }
            }
        }

        match self.get(REFRESH_TOKEN_KEY) {
            Some(refresh_token) => self.refresh_with(refresh_token).await.map(Some),
            None => Ok(None),
        }
    }

    fn has_account(&self) -> bool {
        self.get(ID_TOKEN_KEY).is_some() || self.get(REFRESH_TOKEN_KEY).is_some()
    }

    async fn sign_out(&self) -> AuthResult<Option<String>> {
        for key in self.storage.keys() {
            if key.starts_with(&self.settings.storage_prefix) {
                self.storage.remove(&key);
            }
        }
        Ok(Some(self.settings.logout_url.clone()))
    }
}

/// Builds [`OidcSdk`] instances from the console configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct OidcSdkBuilder;

impl IdentitySdkBuilder for OidcSdkBuilder {
    fn build(
        &self,
        kind: ProviderKind,
        config: &AuthConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> AuthResult<Arc<dyn IdentitySdk>> {
        let settings = OidcSettings::for_kind(kind, config)?;
        Ok(Arc::new(OidcSdk::new(settings, storage)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn sdk() -> (OidcSdk, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let settings = OidcSettings {
            kind: ProviderKind::Cognito,
            client_id: "client".to_string(),
            issuer: "https://issuer.example".to_string(),
            redirect_uri: "https://console.example/".to_string(),
            logout_url: "https://issuer.example/logout".to_string(),
            scopes: vec![],
            storage_prefix: "CognitoIdentityServiceProvider.client.".to_string(),
        };
        (OidcSdk::new(settings, storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_requires_initialization() {
        let (sdk, _) = sdk();
        assert!(matches!(
            sdk.begin_redirect_login().await,
            Err(AuthError::InitializationFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_callback_without_pending_login_is_ignored() {
        let (sdk, _) = sdk();
        let callback = RedirectCallback {
            code: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(sdk.complete_redirect(&callback).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_out_removes_own_keys() {
        let (sdk, storage) = sdk();
        storage.set("CognitoIdentityServiceProvider.client.id_token", "x");
        storage.set("token", "app");
        assert!(sdk.has_account());

        let url = sdk.sign_out().await.unwrap();

        assert_eq!(url.as_deref(), Some("https://issuer.example/logout"));
        assert!(!sdk.has_account());
        assert_eq!(storage.get("token").as_deref(), Some("app"));
    }

    #[tokio::test]
    async fn test_silent_without_tokens_is_none() {
        let (sdk, _) = sdk();
        assert_eq!(sdk.acquire_token_silent(false).await.unwrap(), None);
    }
}
