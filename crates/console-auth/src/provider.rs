//! The provider contract shared by every identity backend.

use crate::claims::RefreshedToken;
use crate::config::ProviderKind;
use crate::error::AuthResult;
use async_trait::async_trait;

/// Capability set implemented by every identity backend.
///
/// Variants are told apart by [`AuthProvider::kind`], never by probing which
/// operations succeed.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// Start or complete a login.
    ///
    /// Password providers need both arguments. Federated providers reject
    /// them and instead restore a stored session or start a redirect; for
    /// them `Ok(true)` may mean "redirect initiated" rather than "logged in".
    async fn login(&self, username: Option<&str>, password: Option<&str>) -> AuthResult<bool>;

    /// End the session. Safe to call when already logged out.
    async fn logout(&self);

    /// Whether the session is authenticated.
    fn is_authenticated(&self) -> bool;

    /// Current application credential.
    fn get_token(&self) -> Option<String>;

    /// Backend user id.
    fn get_user_id(&self) -> Option<String>;

    /// Silently renew the credential.
    ///
    /// `Ok(None)` when there is no session to renew;
    /// `Err(AuthError::RefreshUnsupported)` for providers without refresh.
    async fn refresh_token(&self) -> AuthResult<Option<RefreshedToken>>;

    /// Drop provider-held session state after the session ended elsewhere,
    /// e.g. when the backend rejected the credential.
    fn revoke(&self) {}

    /// Whether [`AuthProvider::refresh_token`] can succeed at all.
    fn supports_refresh(&self) -> bool {
        self.kind().supports_refresh()
    }
}
