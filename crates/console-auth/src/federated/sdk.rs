//! Identity SDK seam.
//!
//! The OpenID-Connect handshake itself (authorization redirect, code
//! exchange, silent renewal, sign-out) is delegated to an SDK. Both supported
//! directories are normalized behind [`IdentitySdk`] so the provider only
//! sees identity tokens and their expiry.

use crate::config::{AuthConfig, ProviderKind};
use crate::error::{AuthError, AuthResult};
use crate::storage::{KeyValueStore, ENTERPRISE_SDK_PREFIX, HOSTED_UI_SDK_PREFIX};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use url::Url;

/// Tokens handed back by an identity SDK.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    /// Raw identity token
    pub id_token: String,

    /// Expiry of the refresh capability, when the directory reports one
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl ProviderResponse {
    /// Response carrying only an identity token.
    pub fn new(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            refresh_expires_at: None,
        }
    }
}

impl std::fmt::Debug for ProviderResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderResponse")
            .field("id_token", &"[REDACTED]")
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// Query parameters of a redirect back from the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectCallback {
    /// Authorization code
    pub code: Option<String>,
    /// Opaque state echoed by the provider
    pub state: Option<String>,
    /// Error code reported by the provider
    pub error: Option<String>,
    /// Human-readable error description
    pub error_description: Option<String>,
}

impl RedirectCallback {
    /// Extract callback parameters from a page URL.
    ///
    /// Returns `None` when the URL is not a redirect callback.
    pub fn from_url(url: &Url) -> Option<Self> {
        let mut callback = RedirectCallback::default();

        // Hosted UIs may answer in the fragment instead of the query.
        let fragment_pairs = url
            .fragment()
            .map(|f| url::form_urlencoded::parse(f.as_bytes()).into_owned().collect::<Vec<_>>())
            .unwrap_or_default();

        for (key, value) in url.query_pairs().into_owned().chain(fragment_pairs) {
            match key.as_str() {
                "code" => callback.code = Some(value),
                "state" => callback.state = Some(value),
                "error" => callback.error = Some(value),
                "error_description" => callback.error_description = Some(value),
                _ => {}
            }
        }

        if callback.code.is_some() || callback.error.is_some() {
            Some(callback)
        } else {
            None
        }
    }

    /// Turn a provider-reported error into an `AuthError`.
    pub fn error(&self) -> Option<AuthError> {
        self.error.as_ref().map(|code| {
            let detail = self
                .error_description
                .as_deref()
                .map(|d| format!("{}: {}", code, d))
                .unwrap_or_else(|| code.clone());
            AuthError::IdentityProvider(detail)
        })
    }
}

/// Operations the federated provider needs from an identity SDK.
#[async_trait]
pub trait IdentitySdk: Send + Sync {
    /// Finish SDK setup (e.g., provider discovery).
    async fn initialize(&self) -> AuthResult<()>;

    /// Prepare a redirect login and return the URL to send the user to.
    async fn begin_redirect_login(&self) -> AuthResult<String>;

    /// Consume a redirect callback.
    async fn complete_redirect(&self, callback: &RedirectCallback) -> AuthResult<Option<ProviderResponse>>;

    /// Renew the identity token without user interaction.
    ///
    /// `force_refresh` bypasses any cached token. `Ok(None)` when there is no
    /// signed-in account.
    async fn acquire_token_silent(&self, force_refresh: bool) -> AuthResult<Option<ProviderResponse>>;

    /// Whether the SDK holds a signed-in account.
    fn has_account(&self) -> bool;

    /// Drop SDK state; may return a provider logout URL to visit.
    async fn sign_out(&self) -> AuthResult<Option<String>>;
}

/// Constructs the identity SDK for a federated provider kind.
pub trait IdentitySdkBuilder: Send + Sync {
    /// Configure an SDK. Must not perform network calls.
    fn build(
        &self,
        kind: ProviderKind,
        config: &AuthConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> AuthResult<Arc<dyn IdentitySdk>>;
}

/// OpenID-Connect settings derived from the configuration of one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcSettings {
    /// Which directory these settings address
    pub kind: ProviderKind,
    /// OAuth client id
    pub client_id: String,
    /// Issuer URL used for discovery
    pub issuer: String,
    /// Redirect URI registered for the console
    pub redirect_uri: String,
    /// Provider sign-out URL
    pub logout_url: String,
    /// Scopes requested in addition to `openid`
    pub scopes: Vec<String>,
    /// Prefix of the storage keys the SDK owns
    pub storage_prefix: String,
}

impl OidcSettings {
    /// Derive settings for a federated provider.
    pub fn for_kind(kind: ProviderKind, config: &AuthConfig) -> AuthResult<Self> {
        fn required(value: &Option<String>, name: &str) -> AuthResult<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .ok_or_else(|| AuthError::ConfigError(format!("{} not configured", name)))
        }

        match kind {
            ProviderKind::Password => Err(AuthError::ConfigError(
                "Password provider has no identity SDK".to_string(),
            )),
            ProviderKind::Azure => {
                let client_id = required(&config.azure.client_id, "AZURE_CLIENT_ID")?;
                let authority = required(&config.azure.authority, "AZURE_AUTHORITY")?;
                let redirect_uri = required(&config.azure.redirect_uri, "AZURE_REDIRECT_URI")?;
                let authority = authority.trim_end_matches('/');
                let logout_url = Url::parse_with_params(
                    &format!("{}/oauth2/v2.0/logout", authority),
                    &[("post_logout_redirect_uri", redirect_uri.as_str())],
                )
                .map_err(|e| AuthError::InitializationFailure(format!("Invalid authority: {}", e)))?;

                Ok(Self {
                    kind,
                    issuer: format!("{}/v2.0", authority),
                    logout_url: logout_url.to_string(),
                    scopes: vec!["profile".to_string(), "email".to_string(), "offline_access".to_string()],
                    storage_prefix: format!("{}{}.", ENTERPRISE_SDK_PREFIX, client_id),
                    client_id,
                    redirect_uri,
                })
            }
            ProviderKind::Cognito => {
                let client_id = required(&config.cognito.client_id, "COGNITO_CLIENT_ID")?;
                let domain = required(&config.cognito.domain, "COGNITO_DOMAIN")?;
                let region = required(&config.cognito.region, "COGNITO_REGION")?;
                let pool = required(&config.cognito.user_pool_id, "COGNITO_USER_POOL_ID")?;
                let redirect_uri = required(&config.cognito.redirect_uri, "COGNITO_REDIRECT_URI")?;
                let domain = domain
                    .trim_start_matches("https://")
                    .trim_end_matches('/');
                let logout_url = Url::parse_with_params(
                    &format!("https://{}/logout", domain),
                    &[("client_id", client_id.as_str()), ("logout_uri", redirect_uri.as_str())],
                )
                .map_err(|e| AuthError::InitializationFailure(format!("Invalid domain: {}", e)))?;

                Ok(Self {
                    kind,
                    issuer: format!("https://cognito-idp.{}.amazonaws.com/{}", region, pool),
                    logout_url: logout_url.to_string(),
                    scopes: vec!["email".to_string(), "profile".to_string()],
                    storage_prefix: format!("{}{}.", HOSTED_UI_SDK_PREFIX, client_id),
                    client_id,
                    redirect_uri,
                })
            }
        }
    }

    /// Storage key owned by the SDK.
    pub fn storage_key(&self, name: &str) -> String {
        format!("{}{}", self.storage_prefix, name)
    }
}
